use super::models::{ApiError, SpotPrice, SpotPriceResponse};
use crate::api::PriceFetcher;
use crate::utils::format_usd;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::time::Duration;
use tracing::{error, info};

/// Spot price client. One GET per call, no retries.
pub struct SpotPriceClient {
    http_client: HttpClient,
    url: String,
}

impl SpotPriceClient {
    /// Create a client for `url` whose requests give up after `timeout`
    pub fn new(url: String, timeout: Duration) -> Result<Self, ApiError> {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::RequestError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http_client, url })
    }

    /// Create a client around a preconfigured HTTP client (for testing)
    pub fn with_http_client(url: String, http_client: HttpClient) -> Self {
        Self { http_client, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_request_error(e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(e.to_string())
        } else {
            ApiError::RequestError(e.to_string())
        }
    }

    /// GET the spot price and decode it
    pub async fn get_spot_price(&self) -> Result<(f64, SpotPrice), ApiError> {
        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ApiError::HttpError(status.as_u16(), body_text));
        }

        let body = response.text().await.map_err(Self::map_request_error)?;
        parse_spot_price(&body)
    }
}

/// Decode the JSON envelope and parse `data.amount` into a positive, finite price
pub fn parse_spot_price(body: &str) -> Result<(f64, SpotPrice), ApiError> {
    let envelope: SpotPriceResponse = serde_json::from_str(body)
        .map_err(|e| ApiError::DeserializationError(format!("Failed to parse response: {}", e)))?;

    let amount = envelope.data.amount.trim();
    let price: f64 = amount
        .parse()
        .map_err(|e| ApiError::InvalidAmount(format!("'{}': {}", amount, e)))?;

    if !price.is_finite() || price <= 0.0 {
        return Err(ApiError::InvalidAmount(format!(
            "'{}' is not a positive price",
            amount
        )));
    }

    Ok((price, envelope.data))
}

#[async_trait]
impl PriceFetcher for SpotPriceClient {
    async fn fetch(&self) -> Option<f64> {
        info!("Fetching spot price from {}", self.url);

        match self.get_spot_price().await {
            Ok((price, quote)) => {
                let pair = match (quote.base.as_deref(), quote.currency.as_deref()) {
                    (Some(base), Some(currency)) => format!("{}-{}", base, currency),
                    _ => "spot".to_string(),
                };
                info!("Successfully fetched {} price: {}", pair, format_usd(price));
                Some(price)
            }
            Err(e) => {
                error!(kind = e.kind(), "Error fetching spot price: {}", e);
                None
            }
        }
    }
}
