//! Gateway Error Types

use thiserror::Error;

use crate::order::OrderId;

/// Result type alias
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Gateway-related errors
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Order lookup failed
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Host storage error (orders, settings)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client construction or URL building failed
    #[error("HTTP error: {0}")]
    Http(String),
}

impl GatewayError {
    /// Get user-friendly message
    pub const fn user_message(&self) -> &str {
        match self {
            Self::OrderNotFound(_) => "Order not found.",
            Self::Config(_) => "Service configuration error.",
            _ => "An error occurred processing your request.",
        }
    }
}

/// Failure while acquiring a hosted payment URL from KuPay.
///
/// Each variant maps to the numeric alert code shown on the
/// order-received page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RedirectError {
    /// Request could not be sent or no response came back
    #[error("KuPay request failed: {0}")]
    Transport(String),

    /// KuPay answered with something other than 200
    #[error("KuPay responded with HTTP {0}")]
    Status(u16),

    /// Response body is not JSON
    #[error("Invalid KuPay API response")]
    InvalidJson,

    /// JSON body has no usable `pay_url`
    #[error("No payment URL in KuPay API response")]
    MissingPayUrl,
}

impl RedirectError {
    /// Numeric alert code for operator diagnosis
    pub const fn code(&self) -> u16 {
        match self {
            Self::InvalidJson => 1000,
            Self::MissingPayUrl => 1001,
            Self::Status(_) => 1002,
            Self::Transport(_) => 1003,
        }
    }
}
