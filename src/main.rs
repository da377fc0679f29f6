use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use payload_capture::capture::{capture_payload, PageTarget};
use payload_capture::config::Settings;

/// Directory per-run log files are written to.
const LOGS_DIR: &str = "LOGS";

/// Captures GraphQL payload templates from the catalog site.
#[derive(Parser, Debug)]
#[command(name = "payload-capture", about = "GraphQL payload capture tool")]
struct Args {
    /// Content CID for the detail page
    #[arg(long, default_value = "ipzz00780")]
    cid: String,

    /// Actress ID for the search page
    #[arg(long, default_value = "1044099")]
    actress: String,

    /// Search result offset
    #[arg(long, default_value_t = 0)]
    offset: u64,

    /// Search results per page
    #[arg(long, default_value_t = 120)]
    limit: u64,
}

/// Console output stays plain; the per-run log file carries timestamps and
/// levels. Returns the log file path so it can be reported at the end.
fn init_logging() -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(LOGS_DIR)?;
    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let log_path = Path::new(LOGS_DIR).join(format!("{timestamp}.log"));
    let log_file = std::fs::File::create(&log_path)?;

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time(),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::new(log_file)),
        )
        .init();

    Ok(log_path)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let log_path = match init_logging() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("failed to set up logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("==================================================");
    info!("GraphQL payload capture starting");
    info!("==================================================");

    info!("[1/2] capturing detail-page payload...");
    let detail = capture_payload(
        &settings,
        &PageTarget::Detail {
            cid: args.cid.clone(),
        },
    )
    .await;

    info!("[2/2] capturing actress-search payload...");
    let actress = capture_payload(
        &settings,
        &PageTarget::ActressSearch {
            actress_id: args.actress.clone(),
            offset: args.offset,
            limit: args.limit,
        },
    )
    .await;

    info!("==================================================");
    info!("run complete");
    info!("log file: {}", log_path.display());
    info!("==================================================");

    if detail.is_some() && actress.is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
