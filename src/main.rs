use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use fieldmap::indexer;
use fieldmap::query::{QueryService, BUILD_VERSION};
use fieldmap::reader::ArchiveReader;
use fieldmap::{server, ServiceContext};

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Archive file ingested once at startup
    #[clap(long)]
    archive: PathBuf,

    #[clap(long, default_value = "8080")]
    http_port: u16,
}

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,fieldmap=info");
    }
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let args = Args::parse();
    info!("--- fieldmap {} ---", BUILD_VERSION);

    let ctx = Arc::new(ServiceContext::new());
    let svc = QueryService::new(ctx.clone());

    // Serve right away; everything except /api/version answers
    // "data not ready" until the archive is fully indexed.
    let port = args.http_port;
    tokio::spawn(async move {
        server::run(svc, port).await;
    });

    let archive = args.archive.clone();
    info!("ingesting {}", archive.display());
    let result = tokio::task::spawn_blocking(move || {
        let records = ArchiveReader::open(&archive)?;
        indexer::ingest(records)
    })
    .await;

    match result {
        Ok(Ok(model)) => {
            ctx.mark_ready(model);
            info!("archive indexed, queries open");
        }
        Ok(Err(e)) => {
            // Fatal: the service stays up in a terminal failed state rather
            // than exposing a half-built model. Restart to retry.
            error!("ingestion failed: {}", e);
            ctx.mark_failed(e.to_string());
        }
        Err(e) => {
            error!("ingestion task panicked: {}", e);
            ctx.mark_failed(e.to_string());
        }
    }

    tokio::signal::ctrl_c().await.unwrap();
    info!("shutting down");
}
