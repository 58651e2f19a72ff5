//! # kupay-gateway
//!
//! Lets a storefront accept crypto payments through KuPay's hosted
//! payment page.
//!
//! ## Payment Flow
//!
//! ```text
//! ┌─────────────┐  initiate   ┌────────────────┐  no ?status  ┌──────────────┐
//! │  Checkout   │────────────▶│ Order received │─────────────▶│ KuPay hosted │
//! │             │ (processing)│      page      │  POST + 302  │ payment page │
//! └─────────────┘             └────────────────┘              └──────────────┘
//!                                     ▲  ?status=completed|cancelled  │
//!                                     └───────────────────────────────┤
//!                                                                     │
//!                             ┌────────────────┐   GET /callback      │
//!                             │ CallbackHandler│◀─────────────────────┘
//!                             │ (authoritative)│
//!                             └────────────────┘
//! ```
//!
//! The browser return is for the shopper only. Order completion comes from
//! the callback, which must carry the merchant API key and the order key.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kupay_gateway::{GatewayConfig, KuPayGateway, OrderId, ReturnPage, SiteUrls};
//!
//! let gateway = KuPayGateway::with_kupay_client(
//!     GatewayConfig::from_env()?,
//!     orders,
//!     cart,
//!     SiteUrls::new("https://shop.example")?,
//! )?;
//!
//! let result = gateway.initiate_payment(OrderId(12))?;
//! // Redirect to: result.redirect
//!
//! match gateway.render_return_page(OrderId(12), None).await? {
//!     ReturnPage::Redirect(pay_url) => { /* 302 */ }
//!     ReturnPage::Html(html) | ReturnPage::Alert { html, .. } => { /* render */ }
//! }
//! ```

mod checkout;
mod config;
mod error;
mod gateway;
mod host;
mod order;
pub mod render;
pub mod shipping;
mod webhook;

pub use checkout::{KuPayClient, PaymentPayload, PaymentUrlProvider, parse_pay_url};
pub use config::{
    CallbackCompletion, FieldKind, GATEWAY_ID, GatewayConfig, MemorySettingsStore,
    SUPPORTED_CURRENCIES, SettingsField, SettingsStore, settings_fields,
};
pub use error::{GatewayError, RedirectError, Result};
pub use gateway::{
    AdminLocation, AdminNotice, GatewayRegistration, KuPayGateway, PaymentResult, ReturnPage,
    payment_complete_order_status,
};
pub use host::{CALLBACK_ROUTE, Cart, MemoryCart, ShippingRate, SiteUrls};
pub use order::{
    LineItem, MemoryOrderStore, Order, OrderDraft, OrderId, OrderKey, OrderStatus, OrderStore,
    ShippingLine,
};
pub use shipping::{ShippingCatalog, StaticShippingCatalog};
pub use webhook::{
    CallbackHandler, CallbackOutcome, CallbackQuery, CallbackRejection, CallbackRequest,
    PaymentStatus, is_well_formed_api_key,
};
