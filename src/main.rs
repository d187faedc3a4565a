use std::process::ExitCode;
use tokio::sync::watch;
use tracing::{error, info, info_span, warn};

mod api;
mod models;
mod services;
mod utils;

use api::coinbase::SpotPriceClient;
use models::RunConfig;
use services::report_service::ReportService;
use services::tracker_service::Tracker;
use utils::format_usd;
use utils::interrupt::{watch_interrupts, Interrupt, FORCED_EXIT_CODE};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    // Flushes the run log file when main returns
    let log_guard = utils::init_logging(&RunConfig::log_dir_from_env());
    if let Some(path) = log_guard.log_file() {
        info!("Logging to {}", path.display());
    }

    info!("📈 Starting price tracker...");

    let config = match RunConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            error!("Please ensure your .env file is correctly set up.");
            return ExitCode::FAILURE;
        }
    };

    let fetcher = match SpotPriceClient::new(config.api_url.clone(), config.request_timeout) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create price client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Tracking {} spot price from {}", config.asset_name, fetcher.url());

    let reporter = ReportService::new(&config);

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, stop_tx).await == Interrupt::Forced {
            std::process::exit(FORCED_EXIT_CODE);
        }
    });

    let run_span = info_span!("run", run_id = %uuid::Uuid::new_v4());
    let mut tracker = Tracker::new(config, fetcher, reporter, run_span);

    match tracker.run(stop_rx).await {
        Ok(summary) => {
            match summary.max_price {
                Some(max) => info!(
                    "Run complete: max price {} across {} samples (chart: {})",
                    format_usd(max),
                    summary.samples,
                    summary
                        .chart_path
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "none".to_string())
                ),
                None => warn!("Run complete: no price data was collected"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Tracker error: {}", e);
            ExitCode::FAILURE
        }
    }
}
