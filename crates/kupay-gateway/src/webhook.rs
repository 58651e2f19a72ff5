//! KuPay Callback Handling
//!
//! KuPay notifies the store out of band once a payment settles. The query
//! carries the merchant API key and the order key; both must match before
//! any order is touched. Every rejection is silent towards the caller.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{CallbackCompletion, GatewayConfig};
use crate::error::Result;
use crate::gateway::payment_complete_order_status;
use crate::order::{OrderId, OrderKey, OrderStatus, OrderStore};

const API_KEY_LEN: usize = 36;

/// Payment status reported by KuPay
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Completed,
    Cancelled,
    Open,
    Expired,
    Failure,
    Error,
}

impl PaymentStatus {
    /// Every status the callback route accepts
    pub const ALLOWED: [Self; 6] = [
        Self::Completed,
        Self::Cancelled,
        Self::Open,
        Self::Expired,
        Self::Failure,
        Self::Error,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Open => "open",
            Self::Expired => "expired",
            Self::Failure => "failure",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALLOWED.into_iter().find(|status| status.as_str() == s)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw callback query string
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CallbackQuery {
    /// Merchant API key
    pub kupay_callback: Option<String>,
    pub order_id: Option<String>,

    /// Order key
    pub key: Option<String>,
    pub status: Option<String>,
}

/// Why a callback was dropped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackRejection {
    MalformedApiKey,
    MalformedOrderId,
    MalformedOrderKey,
    UnknownStatus,
    ApiKeyMismatch,
    UnknownOrder,
    OrderKeyMismatch,
}

/// Syntactically valid callback
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackRequest {
    pub api_key: String,
    pub order_id: OrderId,
    pub order_key: OrderKey,
    pub status: PaymentStatus,
}

/// 36 characters, hexadecimal once hyphens are removed
pub fn is_well_formed_api_key(key: &str) -> bool {
    if key.len() != API_KEY_LEN {
        return false;
    }
    let digits: Vec<char> = key.chars().filter(|c| *c != '-').collect();
    !digits.is_empty() && digits.iter().all(char::is_ascii_hexdigit)
}

fn field(value: Option<&String>) -> &str {
    value.map_or("", |v| v.trim())
}

impl TryFrom<&CallbackQuery> for CallbackRequest {
    type Error = CallbackRejection;

    fn try_from(query: &CallbackQuery) -> std::result::Result<Self, Self::Error> {
        let api_key = field(query.kupay_callback.as_ref());
        if !is_well_formed_api_key(api_key) {
            return Err(CallbackRejection::MalformedApiKey);
        }

        let order_id = field(query.order_id.as_ref())
            .parse::<u64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or(CallbackRejection::MalformedOrderId)?;

        let order_key = field(query.key.as_ref());
        if !order_key.starts_with(OrderKey::PREFIX) {
            return Err(CallbackRejection::MalformedOrderKey);
        }

        let status = PaymentStatus::parse(field(query.status.as_ref()))
            .ok_or(CallbackRejection::UnknownStatus)?;

        Ok(Self {
            api_key: api_key.to_string(),
            order_id: OrderId(order_id),
            order_key: OrderKey::from_string(order_key),
            status,
        })
    }
}

/// Result of processing a callback
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Validation failed, nothing changed
    Rejected(CallbackRejection),

    /// Informational status, nothing changed
    Ignored(PaymentStatus),

    /// Order moved to this status
    Transitioned(OrderStatus),
}

/// Callback handler
pub struct CallbackHandler {
    config: GatewayConfig,
    orders: Arc<dyn OrderStore>,
}

impl CallbackHandler {
    pub fn new(config: GatewayConfig, orders: Arc<dyn OrderStore>) -> Self {
        Self { config, orders }
    }

    /// Validate the raw query then process it
    pub fn handle_query(&self, query: &CallbackQuery) -> Result<CallbackOutcome> {
        match CallbackRequest::try_from(query) {
            Ok(request) => self.handle(&request),
            Err(rejection) => {
                tracing::debug!(reason = ?rejection, "Dropping malformed KuPay callback");
                Ok(CallbackOutcome::Rejected(rejection))
            }
        }
    }

    /// Process a validated callback
    pub fn handle(&self, request: &CallbackRequest) -> Result<CallbackOutcome> {
        let outcome = self.reconcile(request)?;

        match outcome {
            CallbackOutcome::Rejected(reason) => {
                tracing::debug!(
                    order_id = %request.order_id,
                    reason = ?reason,
                    "Rejected KuPay callback"
                );
            }
            CallbackOutcome::Ignored(status) => {
                tracing::debug!(
                    order_id = %request.order_id,
                    status = %status,
                    "Ignoring KuPay status"
                );
            }
            CallbackOutcome::Transitioned(status) => {
                tracing::info!(
                    order_id = %request.order_id,
                    status = %status,
                    "Order updated by KuPay callback"
                );
            }
        }

        Ok(outcome)
    }

    fn reconcile(&self, request: &CallbackRequest) -> Result<CallbackOutcome> {
        if !self.config.has_api_key() || request.api_key != self.config.api_key {
            return Ok(CallbackOutcome::Rejected(CallbackRejection::ApiKeyMismatch));
        }

        let Some(order) = self.orders.get(request.order_id)? else {
            return Ok(CallbackOutcome::Rejected(CallbackRejection::UnknownOrder));
        };

        if order.order_key != request.order_key {
            return Ok(CallbackOutcome::Rejected(CallbackRejection::OrderKeyMismatch));
        }

        // Keep in sync with PaymentStatus::ALLOWED
        match request.status {
            PaymentStatus::Completed => match self.config.callback_completion {
                CallbackCompletion::StatusUpdate => {
                    self.orders.update_status(order.id, OrderStatus::Completed)?;
                    Ok(CallbackOutcome::Transitioned(OrderStatus::Completed))
                }
                CallbackCompletion::PaymentComplete => {
                    let status = payment_complete_order_status(OrderStatus::Processing, &order);
                    self.orders.payment_complete(order.id, status)?;
                    Ok(CallbackOutcome::Transitioned(status))
                }
            },
            // Issued by support staff, not by the automated flow
            PaymentStatus::Cancelled => {
                self.orders.update_status(order.id, OrderStatus::Cancelled)?;
                Ok(CallbackOutcome::Transitioned(OrderStatus::Cancelled))
            }
            PaymentStatus::Open
            | PaymentStatus::Expired
            | PaymentStatus::Failure
            | PaymentStatus::Error => Ok(CallbackOutcome::Ignored(request.status)),
        }
    }
}
