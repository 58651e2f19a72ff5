//! KuPay Hosted Checkout
//!
//! Acquires the hosted payment URL for an order. The order snapshot and
//! the three return URLs are POSTed to
//! `{api_base_url}/webhook/woocommerce/{api_key}`; a 200 answer carries
//! the `pay_url` the shopper is redirected to.

use async_trait::async_trait;
use reqwest::{
    Client, StatusCode, Url,
    header::{CONTENT_TYPE, HeaderValue},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, RedirectError, Result};
use crate::host::SiteUrls;
use crate::order::Order;

/// Payment initiation payload
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentPayload {
    /// Full order snapshot
    pub order: Order,

    /// Browser return URL when the shopper cancels
    pub cancel_url: String,

    /// Browser return URL after payment
    pub paid_url: String,

    /// Server-to-server notification URL
    pub callback_url: String,
}

impl PaymentPayload {
    /// Build the payload for an order
    pub fn for_order(order: &Order, urls: &SiteUrls) -> Result<Self> {
        let received = urls.order_received_url(order)?;

        let mut cancel_url = received.clone();
        cancel_url.query_pairs_mut().append_pair("status", "cancelled");

        let mut paid_url = received;
        paid_url.query_pairs_mut().append_pair("status", "completed");

        Ok(Self {
            order: order.clone(),
            cancel_url: cancel_url.into(),
            paid_url: paid_url.into(),
            callback_url: urls.callback_url(order)?.into(),
        })
    }
}

/// Source of hosted payment URLs (Strategy pattern)
#[async_trait]
pub trait PaymentUrlProvider: Send + Sync {
    /// Ask the processor for a payment page; no retries
    async fn request_payment_url(
        &self,
        payload: &PaymentPayload,
    ) -> std::result::Result<String, RedirectError>;
}

/// KuPay API client
pub struct KuPayClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl KuPayClient {
    /// Create a new client with the configured timeout
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Merchant webhook endpoint
    fn endpoint(&self) -> std::result::Result<Url, RedirectError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| RedirectError::Transport(format!("invalid KuPay API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| RedirectError::Transport("KuPay API URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["webhook", "woocommerce", self.api_key.as_str()]);
        Ok(url)
    }
}

/// Extract `pay_url` from a KuPay response body
///
/// The URL ends up in a `Location` header, so anything that is not a valid
/// header value counts as missing.
pub fn parse_pay_url(body: &str) -> std::result::Result<String, RedirectError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|_| RedirectError::InvalidJson)?;
    if value.is_null() {
        return Err(RedirectError::InvalidJson);
    }

    value
        .get("pay_url")
        .and_then(serde_json::Value::as_str)
        .filter(|url| !url.is_empty() && HeaderValue::from_str(url).is_ok())
        .map(String::from)
        .ok_or(RedirectError::MissingPayUrl)
}

#[async_trait]
impl PaymentUrlProvider for KuPayClient {
    async fn request_payment_url(
        &self,
        payload: &PaymentPayload,
    ) -> std::result::Result<String, RedirectError> {
        let url = self.endpoint()?;

        tracing::debug!(
            host = url.host_str().unwrap_or_default(),
            order_id = %payload.order.id,
            "Requesting KuPay payment URL"
        );

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .json(payload)
            .send()
            .await
            .map_err(|e| RedirectError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RedirectError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RedirectError::Transport(e.without_url().to_string()))?;

        parse_pay_url(&body)
    }
}
