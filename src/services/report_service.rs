use crate::models::{RunConfig, Sample};
use crate::services::chart_service::{self, CHART_HEIGHT, CHART_WIDTH};
use crate::services::email_service::Mailer;
use crate::utils::errors::ReportError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// End-of-run reporting. Outcomes only affect logging: the samples are
/// already persisted by the time either method runs.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Render the samples to an image, returning where it was written
    async fn render_chart(&self, samples: &[Sample]) -> Option<PathBuf>;

    /// Deliver the summary. `chart_path` may be absent.
    async fn send_report(
        &self,
        recipient: &str,
        max_price: f64,
        chart_path: Option<&Path>,
    ) -> Result<(), ReportError>;
}

/// PNG chart via plotters plus an optional SMTP email
pub struct ReportService {
    chart_path: PathBuf,
    asset_name: String,
    mailer: Option<Mailer>,
}

impl ReportService {
    pub fn new(config: &RunConfig) -> Self {
        let mailer = config.email.clone().map(|email| {
            Mailer::new(email, config.asset_name.clone())
        });

        Self {
            chart_path: config.chart_path.clone(),
            asset_name: config.asset_name.clone(),
            mailer,
        }
    }
}

#[async_trait]
impl Reporter for ReportService {
    async fn render_chart(&self, samples: &[Sample]) -> Option<PathBuf> {
        info!("Generating price graph for {} samples...", samples.len());

        // plotters does blocking file and CPU work
        let samples = samples.to_vec();
        let path = self.chart_path.clone();
        let asset_name = self.asset_name.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            chart_service::render_price_chart(&samples, &path, &asset_name, CHART_WIDTH, CHART_HEIGHT)
                .map(|_| path)
        })
        .await;

        match rendered {
            Ok(Ok(path)) => {
                info!("Graph successfully saved to {}", path.display());
                Some(path)
            }
            Ok(Err(e)) => {
                error!("Failed to generate graph: {}", e);
                None
            }
            Err(e) => {
                error!("Graph rendering task failed: {}", e);
                None
            }
        }
    }

    async fn send_report(
        &self,
        recipient: &str,
        max_price: f64,
        chart_path: Option<&Path>,
    ) -> Result<(), ReportError> {
        let mailer = self.mailer.as_ref().ok_or(ReportError::Disabled)?;
        info!("Sending email report to {}", recipient);
        mailer.send_report(recipient, max_price, chart_path).await
    }
}
