use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Url};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "folio-guard-cli")]
#[command(about = "Management CLI for the folio-guard service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service status
    Status,
    /// List live rate limit counters
    Limits,
    /// Reset one rate limit counter, e.g. `pdf-gen:203.0.113.7`
    Reset { key: String },
    /// Run a URL through the SSRF validator
    Validate {
        url: String,
        /// Also resolve the host and check the resolved addresses
        #[arg(long)]
        resolve: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = Url::parse(&cli.url)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = match cli.command {
        Commands::Status => {
            client
                .get(base.join("/admin/status")?)
                .headers(headers)
                .send()
                .await?
        }
        Commands::Limits => {
            client
                .get(base.join("/admin/rate-limits")?)
                .headers(headers)
                .send()
                .await?
        }
        Commands::Reset { key } => {
            let mut url = base.join("/admin/rate-limits/")?;
            url.path_segments_mut()
                .map_err(|_| "service URL cannot be a base")?
                .pop_if_empty()
                .push(&key);
            client
                .request(Method::DELETE, url)
                .headers(headers)
                .send()
                .await?
        }
        Commands::Validate { url, resolve } => {
            client
                .post(base.join("/v1/validate-url")?)
                .json(&serde_json::json!({ "url": url, "resolve": resolve }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: folio-guard returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    if status == reqwest::StatusCode::NO_CONTENT {
        println!("OK");
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
