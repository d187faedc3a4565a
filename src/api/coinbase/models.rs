use serde::{Deserialize, Serialize};

/// Spot price payload: `{"data": {"base": "BTC", "currency": "USD", "amount": "105565.74"}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotPrice {
    pub amount: String,
    pub base: Option<String>,
    pub currency: Option<String>,
}

/// Full response envelope from the spot price endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotPriceResponse {
    pub data: SpotPrice,
}

/// Error type for spot price requests
#[derive(Debug, Clone)]
pub enum ApiError {
    /// Connection refused, DNS failure, TLS failure...
    RequestError(String),
    /// Request exceeded the configured timeout
    Timeout(String),
    /// Non-2xx response
    HttpError(u16, String),
    /// Body is not the expected JSON envelope
    DeserializationError(String),
    /// `amount` is not a usable price
    InvalidAmount(String),
}

impl ApiError {
    /// Short error kind for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::RequestError(_) => "request",
            ApiError::Timeout(_) => "timeout",
            ApiError::HttpError(_, _) => "http_status",
            ApiError::DeserializationError(_) => "malformed_payload",
            ApiError::InvalidAmount(_) => "invalid_amount",
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::RequestError(msg) => write!(f, "Request Error: {}", msg),
            ApiError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ApiError::HttpError(code, msg) => write!(f, "HTTP Error ({}): {}", code, msg),
            ApiError::DeserializationError(msg) => write!(f, "Deserialization Error: {}", msg),
            ApiError::InvalidAmount(msg) => write!(f, "Invalid Amount: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}
