use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use fieldmap::model::RecordKind;
use fieldmap::reader::ArchiveReader;

#[derive(Parser, Debug)]
#[clap(author, version, about = "fieldmap archive inspector and query client", long_about = None)]
struct Args {
    /// Server address for the query subcommands
    #[clap(long, default_value = "127.0.0.1:8080")]
    host: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan an archive offline and print a summary
    Inspect { archive: PathBuf },
    /// Fetch the plan text from a running server
    Plan,
    /// Fetch one second-of-day slice from a running server
    Field { second: i64 },
    /// Fetch the server build descriptor
    Version,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let outcome = match args.command {
        Command::Inspect { archive } => inspect(&archive),
        Command::Plan => fetch_text(&args.host, "/api/model").await,
        Command::Field { second } => {
            fetch_json(&args.host, &format!("/api/field?time={}", second)).await
        }
        Command::Version => fetch_json(&args.host, "/api/version").await,
    };

    if let Err(e) = outcome {
        eprintln!("[\u{2717}] {}", e);
        std::process::exit(1);
    }
}

fn inspect(path: &Path) -> Result<(), String> {
    let reader = ArchiveReader::open(path).map_err(|e| e.to_string())?;

    let mut plans: u64 = 0;
    let mut fields: u64 = 0;
    let mut engines: u64 = 0;
    let mut payload_bytes: u64 = 0;
    let mut first_ts: Option<i64> = None;
    let mut last_ts: Option<i64> = None;

    for record in reader {
        let record = record.map_err(|e| e.to_string())?;
        match record.kind {
            RecordKind::Plan => plans += 1,
            RecordKind::Field => fields += 1,
            RecordKind::Engine => engines += 1,
        }
        payload_bytes += record.payload.len() as u64;
        if first_ts.is_none() {
            first_ts = Some(record.timestamp_ms);
        }
        last_ts = Some(record.timestamp_ms);
    }

    println!("{}:", path.display());
    println!("  plan records:   {}", plans);
    println!("  field records:  {}", fields);
    println!("  engine records: {}", engines);
    println!("  payload bytes:  {}", payload_bytes);
    match (first_ts, last_ts) {
        (Some(first), Some(last)) => println!("  time range:     {}ms .. {}ms", first, last),
        _ => println!("  time range:     (no records)"),
    }
    Ok(())
}

async fn fetch_text(host: &str, route: &str) -> Result<(), String> {
    let url = format!("http://{}{}", host, route);
    let client = reqwest::Client::new();
    let resp = client.get(&url).send().await.map_err(|e| e.to_string())?;
    let status = resp.status();
    let body = resp.text().await.map_err(|e| e.to_string())?;

    if status.is_success() {
        println!("{}", body);
        Ok(())
    } else {
        Err(server_error(&body))
    }
}

async fn fetch_json(host: &str, route: &str) -> Result<(), String> {
    let url = format!("http://{}{}", host, route);
    let client = reqwest::Client::new();
    let resp = client.get(&url).send().await.map_err(|e| e.to_string())?;
    let status = resp.status();
    let body: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;

    if status.is_success() {
        let pretty = serde_json::to_string_pretty(&body).map_err(|e| e.to_string())?;
        println!("{}", pretty);
        Ok(())
    } else {
        Err(body["error"].as_str().unwrap_or("request failed").to_string())
    }
}

fn server_error(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_owned))
        .unwrap_or_else(|| "request failed".to_string())
}
