use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "kv-cli")]
#[command(about = "Command-line client for the key/value relay chain", long_about = None)]
struct Cli {
    /// Base URL of the service to talk to.
    #[arg(short, long, default_value = "http://localhost:4040")]
    url: String,

    /// Address the UI service (`/get`, `/set`) instead of a relay.
    #[arg(long)]
    ui: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the value stored under a key
    Get { key: String },
    /// Store a value under a key
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match &cli.command {
        Commands::Get { key } => {
            let url = if cli.ui { format!("{}/get", base) } else { format!("{}/", base) };
            client.get(url).query(&[("key", key)]).send().await?
        }
        Commands::Set { key, value } => {
            let url = if cli.ui { format!("{}/set", base) } else { format!("{}/", base) };
            client
                .post(url)
                .query(&[("key", key), ("value", value)])
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let request_id = res
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if !text.is_empty() {
            eprintln!("Details: {}", text);
        }
        if let Some(id) = request_id {
            eprintln!("Request ID: {}", id);
        }
        std::process::exit(1);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json @ Value::Object(_)) => println!("{}", serde_json::to_string_pretty(&json)?),
        _ if text.is_empty() => println!("{}", status),
        _ => println!("{}", text),
    }
    Ok(())
}
