//! Server Configuration

use anyhow::Result;

/// Host service settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,

    /// Public storefront URL used in every generated link
    pub site_url: String,

    /// Store currency (ISO 4217)
    pub store_currency: String,

    /// Bearer token for the admin routes; admin is disabled when unset
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            site_url: "http://localhost:3000".into(),
            store_currency: "USD".into(),
            admin_token: None,
        }
    }
}

impl ServerConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let store_currency = std::env::var("STORE_CURRENCY")
            .map(|c| c.trim().to_uppercase())
            .unwrap_or(defaults.store_currency);
        if store_currency.len() != 3 {
            anyhow::bail!("STORE_CURRENCY must be a three letter code, got '{store_currency}'");
        }

        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            site_url: std::env::var("SITE_URL").unwrap_or(defaults.site_url),
            store_currency,
            admin_token: std::env::var("ADMIN_TOKEN")
                .ok()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        })
    }
}
