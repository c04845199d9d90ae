use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Admin client for the push gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API key, sent as a bearer token.
    #[arg(short, long, env = "GATEWAY_ADMIN_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send an alert to every connected user
    Broadcast {
        #[command(flatten)]
        payload: Payload,
    },
    /// Send an alert to one user
    Push {
        user_id: String,
        #[command(flatten)]
        payload: Payload,
    },
    /// Send an alert to a list of users
    PushBatch {
        #[arg(required = true, value_delimiter = ',')]
        user_ids: Vec<String>,
        #[command(flatten)]
        payload: Payload,
    },
    /// Number of connected users
    OnlineCount,
    /// Whether a user is connected
    IsOnline { user_id: String },
}

#[derive(clap::Args)]
#[group(required = true, multiple = false)]
struct Payload {
    /// Inline JSON payload
    #[arg(short, long)]
    data: Option<String>,

    /// Read the JSON payload from a file
    #[arg(short, long)]
    file: Option<PathBuf>,
}

impl Payload {
    fn load(&self) -> Result<Value, Box<dyn std::error::Error>> {
        let raw = match (&self.data, &self.file) {
            (Some(inline), _) => inline.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)?,
            (None, None) => return Err("a payload is required".into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(
        "x-request-id",
        HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())?,
    );
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let request = match &cli.command {
        Commands::Broadcast { payload } => client
            .post(format!("{}/api/push/broadcast", base))
            .json(&payload.load()?),
        Commands::Push { user_id, payload } => client
            .post(format!("{}/api/push/users/{}", base, user_id))
            .json(&payload.load()?),
        Commands::PushBatch { user_ids, payload } => client
            .post(format!("{}/api/push/batch", base))
            .json(&json!({ "userIds": user_ids, "data": payload.load()? })),
        Commands::OnlineCount => client.get(format!("{}/api/online/count", base)),
        Commands::IsOnline { user_id } => client.get(format!("{}/api/online/{}", base, user_id)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
