use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Command-line client for the service gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gateway and backend link health
    Health,
    /// Look up a user by id
    User { id: String },
    /// Dispatch an event with a JSON object payload
    Event { payload: String },
    /// Route a message with a pattern and a JSON object payload
    Message { pattern: String, data: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
        Commands::User { id } => {
            client
                .get(format!("{}/gateway/users/{}", base, id))
                .send()
                .await?
        }
        Commands::Event { payload } => {
            let body: Value = serde_json::from_str(&payload)?;
            client
                .post(format!("{}/gateway/events", base))
                .json(&body)
                .send()
                .await?
        }
        Commands::Message { pattern, data } => {
            let data: Value = serde_json::from_str(&data)?;
            client
                .post(format!("{}/gateway/message", base))
                .json(&serde_json::json!({ "pattern": pattern, "data": data }))
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
        .unwrap_or("-")
        .to_string();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: gateway returned status {} (request {})", status, request_id);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
