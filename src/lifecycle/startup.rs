//! Startup helpers.

use std::sync::Arc;

use crate::config::RateLimitSettings;
use crate::security::store::MemoryStore;

/// Open the counter store, seeding it from the snapshot when configured.
///
/// An unreadable snapshot is logged and replaced by an empty store: losing
/// counters only resets windows early, which the limiter tolerates.
pub fn open_store(settings: &RateLimitSettings) -> Arc<MemoryStore> {
    let Some(path) = &settings.persistence_path else {
        return Arc::new(MemoryStore::new(None));
    };

    match MemoryStore::load_from_file(path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "Failed to load rate limit snapshot, starting empty"
            );
            Arc::new(MemoryStore::new(Some(path.clone())))
        }
    }
}
