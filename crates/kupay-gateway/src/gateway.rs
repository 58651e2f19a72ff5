//! KuPay Gateway
//!
//! Availability, payment initiation and the order-received page. The
//! hosted payment URL is only requested once the shopper lands on the
//! order-received page without a `status` parameter.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::checkout::{KuPayClient, PaymentPayload, PaymentUrlProvider};
use crate::config::{GATEWAY_ID, GatewayConfig, SUPPORTED_CURRENCIES};
use crate::error::{GatewayError, Result};
use crate::host::{Cart, SiteUrls};
use crate::order::{Order, OrderId, OrderStatus, OrderStore};
use crate::render;
use crate::shipping::{self, ShippingCatalog, ShippingOptionGroup};

/// Gateway logo, relative to the site URL
pub const ICON_PATH: &str = "assets/kupay/icon.png";

const ADMIN_TITLE: &str = "KuPay Crypto Payment Gateway";
const MISSING_API_KEY: &str = "KuPay Payment Gateway Error: Enter your API key.";

/// Status an order moves to when its payment completes
///
/// KuPay orders skip `processing` and go straight to `completed`.
pub fn payment_complete_order_status(default: OrderStatus, order: &Order) -> OrderStatus {
    if order.payment_method == GATEWAY_ID {
        OrderStatus::Completed
    } else {
        default
    }
}

/// Result of processing a payment at checkout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    /// Always "success"; failures surface as errors
    pub result: String,

    /// Where the browser goes next
    pub redirect: String,
}

impl PaymentResult {
    fn success(redirect: impl Into<String>) -> Self {
        Self {
            result: "success".into(),
            redirect: redirect.into(),
        }
    }
}

/// What the order-received page should do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReturnPage {
    /// 302 to the hosted payment page
    Redirect(String),

    /// Render this fragment
    Html(String),

    /// Render an inline alert; no redirect
    Alert { code: u16, html: String },
}

/// `status` parameter on the order-received page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReturnStatus {
    Completed,
    Cancelled,
    Other,
}

impl ReturnStatus {
    fn parse(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            _ => Self::Other,
        }
    }
}

/// Gateway registration record
#[derive(Clone, Debug, Serialize)]
pub struct GatewayRegistration {
    pub id: &'static str,

    /// Shown to shoppers at checkout
    pub title: String,

    /// Shown on the admin payments screen
    pub method_title: &'static str,
    pub description: String,
    pub method_description: String,
    pub enabled: bool,
    pub has_fields: bool,
}

/// Where an administrator currently is
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AdminLocation {
    #[serde(default)]
    pub is_admin: bool,
    pub page: Option<String>,
    pub tab: Option<String>,
    pub section: Option<String>,
}

impl AdminLocation {
    /// Settings section of this gateway
    pub fn gateway_settings() -> Self {
        Self {
            is_admin: true,
            page: Some("wc-settings".into()),
            tab: Some("checkout".into()),
            section: Some(GATEWAY_ID.into()),
        }
    }

    /// Whether the request is on the store settings
    ///
    /// `level`: 0 = any admin page, 1 = store settings, 2 = checkout tab,
    /// 3 = this gateway's section.
    pub fn is_accessing_settings(&self, level: u8) -> bool {
        if !self.is_admin {
            return false;
        }
        if level >= 1 && self.page.as_deref() != Some("wc-settings") {
            return false;
        }
        if level >= 2 && self.tab.as_deref() != Some("checkout") {
            return false;
        }
        if level >= 3 && self.section.as_deref() != Some(GATEWAY_ID) {
            return false;
        }
        true
    }
}

/// Admin-visible warning
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AdminNotice {
    pub message: String,
    pub html: String,
}

impl AdminNotice {
    fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        let html = render::admin_notice(&message);
        Self { message, html }
    }
}

/// KuPay payment gateway
pub struct KuPayGateway {
    config: GatewayConfig,
    orders: Arc<dyn OrderStore>,
    cart: Arc<dyn Cart>,
    urls: SiteUrls,
    payments: Arc<dyn PaymentUrlProvider>,
}

impl KuPayGateway {
    /// Create a gateway with an explicit payment URL provider
    pub fn new(
        config: GatewayConfig,
        orders: Arc<dyn OrderStore>,
        cart: Arc<dyn Cart>,
        urls: SiteUrls,
        payments: Arc<dyn PaymentUrlProvider>,
    ) -> Self {
        Self {
            config,
            orders,
            cart,
            urls,
            payments,
        }
    }

    /// Create a gateway talking to the KuPay API
    pub fn with_kupay_client(
        config: GatewayConfig,
        orders: Arc<dyn OrderStore>,
        cart: Arc<dyn Cart>,
        urls: SiteUrls,
    ) -> Result<Self> {
        let client = KuPayClient::new(&config)?;
        Ok(Self::new(config, orders, cart, urls, Arc::new(client)))
    }

    pub const fn id(&self) -> &'static str {
        GATEWAY_ID
    }

    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn load_order(&self, id: OrderId) -> Result<Order> {
        self.orders.get(id)?.ok_or(GatewayError::OrderNotFound(id))
    }

    /// Check if the gateway can be offered
    ///
    /// `order_pay` is set when the shopper pays for an existing order
    /// instead of checking out a cart.
    pub fn is_available(&self, order_pay: Option<OrderId>) -> bool {
        if !self.config.has_api_key() || !self.config.enabled {
            return false;
        }

        let order = match order_pay.map(|id| self.orders.get(id)).transpose() {
            Ok(order) => order.flatten(),
            Err(e) => {
                tracing::warn!(error = %e, "Order lookup failed during availability check");
                return false;
            }
        };

        let needs_shipping =
            self.cart.needs_shipping() || order.as_ref().is_some_and(Order::needs_shipping);

        if !self.config.enable_for_virtual && !needs_shipping {
            return false;
        }

        if !self.config.enable_for_methods.is_empty() && needs_shipping {
            let rate_ids = match &order {
                Some(order) if !order.shipping_lines.is_empty() => {
                    shipping::order_rate_ids(&order.shipping_lines)
                }
                _ => shipping::package_rate_ids(&self.cart.chosen_shipping_rates()),
            };

            if shipping::matching_rates(&self.config.enable_for_methods, &rate_ids).is_empty() {
                return false;
            }
        }

        true
    }

    /// Process the payment at checkout
    ///
    /// Paid orders move to `processing` and wait for KuPay; free orders are
    /// completed immediately. The cart is emptied either way.
    pub fn initiate_payment(&self, order_id: OrderId) -> Result<PaymentResult> {
        let order = self.load_order(order_id)?;

        if order.total > Decimal::ZERO {
            self.orders.update_status(order.id, OrderStatus::Processing)?;
        } else {
            let status = payment_complete_order_status(OrderStatus::Processing, &order);
            self.orders.payment_complete(order.id, status)?;
        }

        self.cart.empty();

        let redirect = self.urls.order_received_url(&order)?;
        tracing::info!(order_id = %order.id, total = %order.total, "KuPay payment initiated");

        Ok(PaymentResult::success(redirect))
    }

    /// Content for the order-received page
    pub async fn render_return_page(
        &self,
        order_id: OrderId,
        status: Option<&str>,
    ) -> Result<ReturnPage> {
        let order = self.load_order(order_id)?;

        if !self.config.has_api_key() || order.payment_method != GATEWAY_ID {
            return Ok(ReturnPage::Html(String::new()));
        }

        match status.map(ReturnStatus::parse) {
            // Finalized by the callback once the payment is confirmed on chain
            Some(ReturnStatus::Completed) => {
                Ok(ReturnPage::Html(render::thank_you(&self.config.instructions)))
            }
            Some(ReturnStatus::Cancelled) => {
                self.orders.update_status(order.id, OrderStatus::Pending)?;
                tracing::info!(order_id = %order.id, "KuPay payment cancelled by shopper");

                let retry_url = self.urls.checkout_payment_url(&order)?;
                Ok(ReturnPage::Html(render::retry_prompt(retry_url.as_str())))
            }
            Some(ReturnStatus::Other) => Ok(ReturnPage::Html(String::new())),
            None => self.acquire_redirect(&order).await,
        }
    }

    async fn acquire_redirect(&self, order: &Order) -> Result<ReturnPage> {
        let payload = PaymentPayload::for_order(order, &self.urls)?;

        match self.payments.request_payment_url(&payload).await {
            Ok(pay_url) => {
                tracing::info!(order_id = %order.id, "Redirecting shopper to KuPay");
                Ok(ReturnPage::Redirect(pay_url))
            }
            Err(e) => {
                let code = e.code();
                tracing::warn!(order_id = %order.id, code, error = %e, "KuPay redirect failed");
                Ok(ReturnPage::Alert {
                    code,
                    html: render::alert(code),
                })
            }
        }
    }

    /// Instructions appended to the customer's order email
    pub fn render_email_instructions(
        &self,
        order: &Order,
        sent_to_admin: bool,
        plain_text: bool,
    ) -> Option<String> {
        if !self.config.has_api_key()
            || self.config.instructions.is_empty()
            || sent_to_admin
            || order.payment_method != GATEWAY_ID
        {
            return None;
        }

        if plain_text {
            Some(format!("{}\n", self.config.instructions))
        } else {
            Some(format!("{}\n", render::instructions_html(&self.config.instructions)))
        }
    }

    /// Record the host lists payment gateways with
    pub fn registration(&self) -> GatewayRegistration {
        GatewayRegistration {
            id: GATEWAY_ID,
            title: self.config.title.clone(),
            method_title: ADMIN_TITLE,
            description: self.config.description.clone(),
            method_description: render::method_description(self.config.has_api_key()),
            enabled: self.config.enabled,
            has_fields: false,
        }
    }

    /// Warnings for an administrator on the store settings
    ///
    /// The missing API key notice only shows on this gateway's section; the
    /// currency notice shows anywhere on the store settings.
    pub fn admin_notices(
        &self,
        location: &AdminLocation,
        store_currency: &str,
    ) -> Vec<AdminNotice> {
        let mut notices = Vec::new();
        if !self.config.has_api_key() && location.is_accessing_settings(3) {
            notices.push(AdminNotice::error(MISSING_API_KEY));
        }
        if location.is_accessing_settings(1) && !SUPPORTED_CURRENCIES.contains(&store_currency) {
            notices.push(AdminNotice::error(format!(
                "KuPay Payment Gateway Error: Your currency ({store_currency}) is not yet \
supported! Contact info@kupay.finance so we can add it! Choose another currency ({}) in \
WooCommerce > Settings > General or disable the payment method until then.",
                SUPPORTED_CURRENCIES.join(", ")
            )));
        }
        notices
    }

    /// Options for the shipping method restriction field
    pub fn shipping_method_options(
        &self,
        catalog: &dyn ShippingCatalog,
        location: &AdminLocation,
    ) -> Vec<ShippingOptionGroup> {
        if !location.is_accessing_settings(3) {
            return Vec::new();
        }
        shipping::shipping_method_options(catalog)
    }

    /// Checkout description filter; replaces the text with the KuPay logo
    pub fn checkout_description(&self, description: &str, payment_id: &str) -> String {
        if payment_id != GATEWAY_ID {
            return description.to_string();
        }
        match self.urls.home().join(ICON_PATH) {
            Ok(icon) => render::checkout_description(icon.as_str()),
            Err(_) => description.to_string(),
        }
    }
}
