//! Application State

use std::sync::Arc;

use kupay_gateway::{
    CallbackHandler, GatewayConfig, KuPayGateway, MemoryCart, MemoryOrderStore,
    MemorySettingsStore, Result, SiteUrls, StaticShippingCatalog,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Order storage (host-owned)
    pub orders: Arc<MemoryOrderStore>,

    /// Gateway settings storage (host-owned)
    pub settings: Arc<MemorySettingsStore>,

    /// Storefront cart
    pub cart: Arc<MemoryCart>,

    /// Shipping zones and methods for the admin restriction field
    pub shipping: Arc<StaticShippingCatalog>,

    pub urls: SiteUrls,

    pub store_currency: String,

    /// Bearer token for admin routes (None = admin disabled)
    pub admin_token: Option<String>,
}

impl AppState {
    /// Gateway settings as stored right now
    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        GatewayConfig::from_settings(self.settings.as_ref())
    }

    /// Gateway bound to this request's configuration
    pub fn gateway(&self) -> Result<KuPayGateway> {
        KuPayGateway::with_kupay_client(
            self.gateway_config()?,
            self.orders.clone(),
            self.cart.clone(),
            self.urls.clone(),
        )
    }

    /// Callback handler bound to this request's configuration
    pub fn callback_handler(&self) -> Result<CallbackHandler> {
        Ok(CallbackHandler::new(self.gateway_config()?, self.orders.clone()))
    }
}
