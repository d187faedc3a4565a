use crate::models::EmailConfig;
use crate::utils::errors::ReportError;
use crate::utils::format_usd;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;
use tracing::{error, info, warn};

/// Port that expects TLS from the first byte; every other port upgrades with STARTTLS
const IMPLICIT_TLS_PORT: u16 = 465;

/// Chart file name and PNG bytes, ready to attach
pub type ChartAttachment = (String, Vec<u8>);

/// Sends the end-of-run report over SMTP
pub struct Mailer {
    config: EmailConfig,
    asset_name: String,
}

/// Read the chart for attaching. A missing or unreadable file is logged and skipped.
pub async fn load_chart(chart_path: Option<&Path>) -> Option<ChartAttachment> {
    let path = match chart_path {
        Some(path) => path,
        None => {
            warn!("No chart available, sending report without attachment");
            return None;
        }
    };

    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "chart.png".to_string());
            Some((filename, bytes))
        }
        Err(e) => {
            error!("Could not attach graph file {}: {}", path.display(), e);
            None
        }
    }
}

impl Mailer {
    pub fn new(config: EmailConfig, asset_name: String) -> Self {
        Self { config, asset_name }
    }

    pub fn subject(&self, max_price: f64) -> String {
        format!(
            "{} Price Report - Max Price: {}",
            self.asset_name,
            format_usd(max_price)
        )
    }

    fn body(&self, max_price: f64, has_chart: bool) -> String {
        let chart_line = if has_chart {
            "The attached graph shows the price trend over this run."
        } else {
            "The price graph could not be attached to this report."
        };

        format!(
            "Hello,\n\n\
             This is your automated {} price report.\n\n\
             The maximum price recorded during this tracking run was: {}\n\n\
             {}\n\n\
             Best Regards,\n\
             Your {} Price Tracker\n",
            self.asset_name,
            format_usd(max_price),
            chart_line,
            self.asset_name
        )
    }

    pub fn build_message(
        &self,
        recipient: &str,
        max_price: f64,
        chart: Option<ChartAttachment>,
    ) -> Result<Message, ReportError> {
        let from: Mailbox = self.config.sender_email.parse()?;
        let to: Mailbox = recipient.parse()?;

        let mut multipart =
            MultiPart::mixed().singlepart(SinglePart::plain(self.body(max_price, chart.is_some())));

        if let Some((filename, bytes)) = chart {
            let content_type = ContentType::parse("image/png")
                .map_err(|e| ReportError::Attachment(e.to_string()))?;
            multipart = multipart.singlepart(Attachment::new(filename).body(bytes, content_type));
        }

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject(max_price))
            .multipart(multipart)?;

        Ok(message)
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, ReportError> {
        let credentials = Credentials::new(
            self.config.sender_email.clone(),
            self.config.sender_password.clone(),
        );

        let builder = if self.config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_server)?
        };

        Ok(builder
            .port(self.config.smtp_port)
            .credentials(credentials)
            .build())
    }

    /// Build and send the report in one SMTP session
    pub async fn send_report(
        &self,
        recipient: &str,
        max_price: f64,
        chart_path: Option<&Path>,
    ) -> Result<(), ReportError> {
        let chart = load_chart(chart_path).await;
        let message = self.build_message(recipient, max_price, chart)?;
        self.transport()?.send(message).await?;
        info!("Email report sent successfully to {}", recipient);
        Ok(())
    }
}
