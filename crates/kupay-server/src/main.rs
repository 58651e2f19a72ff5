//! kupay-server
//!
//! Axum storefront host for the KuPay gateway: checkout, the
//! order-received page, the KuPay callback and gateway settings.

mod config;
mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kupay_gateway::{
    CALLBACK_ROUTE, GatewayConfig, MemoryCart, MemoryOrderStore, MemorySettingsStore,
    SUPPORTED_CURRENCIES, SiteUrls, StaticShippingCatalog,
};

use crate::config::ServerConfig;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let server = ServerConfig::from_env()?;
    let urls = SiteUrls::new(&server.site_url)?;

    // Seed gateway settings
    let gateway_config = GatewayConfig::from_env()?;
    if gateway_config.has_api_key() {
        tracing::info!("✓ KuPay configured ({})", gateway_config.api_base_url);
    } else {
        tracing::warn!("⚠ KuPay API key not set - gateway will not be offered at checkout");
        tracing::warn!("  Set KUPAY_API_KEY in .env or save it via /api/admin/settings");
    }
    if !SUPPORTED_CURRENCIES.contains(&server.store_currency.as_str()) {
        tracing::warn!(
            "⚠ Store currency {} is not supported by KuPay",
            server.store_currency
        );
    }
    if server.admin_token.is_none() {
        tracing::warn!("⚠ ADMIN_TOKEN not set - admin settings routes disabled");
    }

    let settings = Arc::new(MemorySettingsStore::with_config(&gateway_config)?);

    // Build application state
    let state = AppState {
        orders: Arc::new(MemoryOrderStore::new()),
        settings,
        cart: Arc::new(MemoryCart::new()),
        shipping: Arc::new(StaticShippingCatalog::default()),
        urls,
        store_currency: server.store_currency.clone(),
        admin_token: server.admin_token.clone(),
    };

    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&server.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 kupay-server running on http://{}", server.bind_addr);
    tracing::info!("   Storefront: {}", server.site_url);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                            - Health check");
    tracing::info!("  GET  /api/gateway                       - Gateway registration");
    tracing::info!("  POST /api/orders                        - Place an order");
    tracing::info!("  POST /api/checkout/{{order_id}}           - Pay with KuPay");
    tracing::info!("  GET  /checkout/order-received/{{order_id}}/ - Order received page");
    tracing::info!("  GET  /{}                          - KuPay callback", CALLBACK_ROUTE);
    tracing::info!("  GET  /api/admin/settings                - Gateway settings");
    tracing::info!("  POST /api/admin/settings                - Save gateway settings");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
