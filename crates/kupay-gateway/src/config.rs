//! Gateway Configuration
//!
//! Settings live in host-managed key/value storage scoped by gateway id.
//! They are parsed once into [`GatewayConfig`] and never read ad hoc.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{GatewayError, Result};

/// Gateway id registered with the host
pub const GATEWAY_ID: &str = "kupay";

/// Store currencies KuPay accepts
pub const SUPPORTED_CURRENCIES: &[&str] = &[
    "USD", "EUR", "JPY", "GBP", "AUD", "CAD", "CHF", "CNY", "HKD", "NZD", "SEK", "KRW", "SGD",
    "NOK", "MXN", "INR", "BRL", "NGN",
];

const DEFAULT_TITLE: &str = "KuPay Crypto Payment Gateway";
const DEFAULT_DESCRIPTION: &str = "KuPay Payment Gateway - Defi Payments made easy via Meta Mask";
const DEFAULT_INSTRUCTIONS: &str = "Thank you for your payment via the KuPay Payment Gateway. \
We will soon receive confirmation about your payment and will then process your order. Thank you!";
const DEFAULT_API_BASE_URL: &str = "https://api.kupay.finance";
const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// How a `completed` callback finalizes the order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackCompletion {
    /// Plain status update, no payment-complete side effects
    #[default]
    StatusUpdate,

    /// Run the host's payment-complete path (paid date, paid-status filter)
    PaymentComplete,
}

impl CallbackCompletion {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StatusUpdate => "status_update",
            Self::PaymentComplete => "payment_complete",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "status_update" => Ok(Self::StatusUpdate),
            "payment_complete" => Ok(Self::PaymentComplete),
            other => Err(GatewayError::Config(format!(
                "callback_completion must be status_update or payment_complete, got '{other}'"
            ))),
        }
    }
}

/// Typed gateway configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub enabled: bool,

    /// Title shown to shoppers at checkout
    pub title: String,

    pub description: String,

    /// Merchant API key; empty disables the gateway
    pub api_key: String,

    /// Shown on the thank-you page and in customer emails
    pub instructions: String,

    /// Restrict to these shipping rates (`method` or `method:instance`)
    pub enable_for_methods: Vec<String>,

    /// Offer the gateway for orders that need no shipping
    pub enable_for_virtual: bool,

    /// KuPay API host
    pub api_base_url: String,

    /// Outbound request timeout in seconds
    pub timeout_secs: u64,

    pub callback_completion: CallbackCompletion,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: DEFAULT_TITLE.into(),
            description: DEFAULT_DESCRIPTION.into(),
            api_key: String::new(),
            instructions: DEFAULT_INSTRUCTIONS.into(),
            enable_for_methods: Vec::new(),
            enable_for_virtual: true,
            api_base_url: DEFAULT_API_BASE_URL.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            callback_completion: CallbackCompletion::default(),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "yes" | "true" | "1" | "on" => Ok(true),
        "no" | "false" | "0" | "off" | "" => Ok(false),
        other => Err(GatewayError::Config(format!("{key} must be yes or no, got '{other}'"))),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

impl GatewayConfig {
    /// Whether an API key has been configured
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Build from any key/value source, defaults for missing keys
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let enabled = match lookup("enabled") {
            Some(v) => parse_bool("enabled", &v)?,
            None => defaults.enabled,
        };
        let enable_for_virtual = match lookup("enable_for_virtual") {
            Some(v) => parse_bool("enable_for_virtual", &v)?,
            None => defaults.enable_for_virtual,
        };
        let timeout_secs = match lookup("timeout_secs") {
            Some(v) => v.trim().parse().map_err(|_| {
                GatewayError::Config(format!("timeout_secs must be a number, got '{v}'"))
            })?,
            None => defaults.timeout_secs,
        };
        if timeout_secs == 0 {
            return Err(GatewayError::Config("timeout_secs must be greater than zero".into()));
        }
        let callback_completion = match lookup("callback_completion") {
            Some(v) => CallbackCompletion::parse(&v)?,
            None => defaults.callback_completion,
        };

        Ok(Self {
            enabled,
            title: lookup("title").unwrap_or(defaults.title),
            description: lookup("description").unwrap_or(defaults.description),
            api_key: lookup("api_key").map(|k| k.trim().to_string()).unwrap_or_default(),
            instructions: lookup("instructions").unwrap_or(defaults.instructions),
            enable_for_methods: lookup("enable_for_methods")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            enable_for_virtual,
            api_base_url: lookup("api_base_url")
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty())
                .unwrap_or(defaults.api_base_url),
            timeout_secs,
            callback_completion,
        })
    }

    /// Create from `KUPAY_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(format!("KUPAY_{}", key.to_uppercase())).ok())
    }

    /// Load from the host settings storage
    pub fn from_settings(store: &dyn SettingsStore) -> Result<Self> {
        let values = store.all(GATEWAY_ID)?;
        Self::from_lookup(|key| values.get(key).cloned())
    }

    /// Flatten into settings storage values
    pub fn to_settings(&self) -> HashMap<String, String> {
        HashMap::from([
            ("enabled".to_string(), yes_no(self.enabled).to_string()),
            ("title".to_string(), self.title.clone()),
            ("description".to_string(), self.description.clone()),
            ("api_key".to_string(), self.api_key.clone()),
            ("instructions".to_string(), self.instructions.clone()),
            ("enable_for_methods".to_string(), self.enable_for_methods.join(",")),
            ("enable_for_virtual".to_string(), yes_no(self.enable_for_virtual).to_string()),
            ("api_base_url".to_string(), self.api_base_url.clone()),
            ("timeout_secs".to_string(), self.timeout_secs.to_string()),
            ("callback_completion".to_string(), self.callback_completion.as_str().to_string()),
        ])
    }

    /// Persist into the host settings storage
    pub fn save(&self, store: &dyn SettingsStore) -> Result<()> {
        for (key, value) in self.to_settings() {
            store.set(GATEWAY_ID, &key, &value)?;
        }
        Ok(())
    }

    /// Admin "save settings" action
    ///
    /// Submitted fields override stored ones; unknown fields are ignored.
    /// Nothing is written unless the merged settings validate.
    pub fn process_admin_options(
        store: &dyn SettingsStore,
        form: &HashMap<String, String>,
    ) -> Result<Self> {
        let mut merged = store.all(GATEWAY_ID)?;
        for field in settings_fields() {
            if let Some(value) = form.get(field.id) {
                merged.insert(field.id.to_string(), value.clone());
            }
        }

        let config = Self::from_lookup(|key| merged.get(key).cloned())?;
        config.save(store)?;

        tracing::info!(
            enabled = config.enabled,
            api_key_set = config.has_api_key(),
            restricted_methods = config.enable_for_methods.len(),
            "Gateway settings saved"
        );
        Ok(config)
    }
}

/// Settings storage trait (implemented by the commerce host)
pub trait SettingsStore: Send + Sync {
    /// All values stored for a gateway
    fn all(&self, gateway_id: &str) -> Result<HashMap<String, String>>;

    fn get(&self, gateway_id: &str, key: &str) -> Result<Option<String>> {
        Ok(self.all(gateway_id)?.remove(key))
    }

    fn set(&self, gateway_id: &str, key: &str, value: &str) -> Result<()>;
}

/// In-memory settings storage (for development and tests)
#[derive(Default)]
pub struct MemorySettingsStore {
    values: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-filled with a gateway configuration
    pub fn with_config(config: &GatewayConfig) -> Result<Self> {
        let store = Self::new();
        config.save(&store)?;
        Ok(store)
    }
}

impl SettingsStore for MemorySettingsStore {
    fn all(&self, gateway_id: &str) -> Result<HashMap<String, String>> {
        let values = self
            .values
            .read()
            .map_err(|_| GatewayError::Storage("settings lock poisoned".into()))?;
        Ok(values.get(gateway_id).cloned().unwrap_or_default())
    }

    fn set(&self, gateway_id: &str, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| GatewayError::Storage("settings lock poisoned".into()))?;
        values
            .entry(gateway_id.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Settings form input kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Checkbox,
    Text,
    Password,
    Textarea,
    Multiselect,
}

/// One field of the admin settings form
#[derive(Clone, Debug, Serialize)]
pub struct SettingsField {
    pub id: &'static str,
    pub title: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
    pub default: Option<&'static str>,

    /// Never echo the stored value back to the form
    pub write_only: bool,
}

/// Admin settings form schema
pub fn settings_fields() -> Vec<SettingsField> {
    vec![
        SettingsField {
            id: "enabled",
            title: "Enable/Disable",
            kind: FieldKind::Checkbox,
            description: "Enable KuPay Crypto Payment Gateway",
            default: Some("yes"),
            write_only: false,
        },
        SettingsField {
            id: "title",
            title: "Title",
            kind: FieldKind::Text,
            description: "KuPay Payment method description that the customer will see on your checkout.",
            default: Some(DEFAULT_TITLE),
            write_only: false,
        },
        SettingsField {
            id: "api_key",
            title: "API Key",
            kind: FieldKind::Password,
            description: "Add your API key",
            default: None,
            write_only: true,
        },
        SettingsField {
            id: "description",
            title: "Gateway Description",
            kind: FieldKind::Textarea,
            description: "KuPay Payment method description that the customer will see on your website.",
            default: Some(DEFAULT_DESCRIPTION),
            write_only: false,
        },
        SettingsField {
            id: "instructions",
            title: "Instructions for Thank you Page",
            kind: FieldKind::Textarea,
            description: "Instructions that will be added to the Thank-You page.",
            default: Some(DEFAULT_INSTRUCTIONS),
            write_only: false,
        },
        SettingsField {
            id: "enable_for_methods",
            title: "Enable for shipping methods",
            kind: FieldKind::Multiselect,
            description: "Only offer KuPay for these shipping methods. Leave empty for all methods.",
            default: None,
            write_only: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert!(!config.has_api_key());
        assert_eq!(config.api_base_url, "https://api.kupay.finance");
        assert_eq!(config.callback_completion, CallbackCompletion::StatusUpdate);
    }

    #[test]
    fn test_lookup_parsing() {
        let values = HashMap::from([
            ("enabled", "no"),
            ("api_key", "  25621898-6434-11ec-93c2-525401d2ddc2 \n"),
            ("enable_for_methods", "flat_rate:1, local_pickup ,"),
            ("api_base_url", "https://kupay.test/"),
            ("timeout_secs", "15"),
            ("callback_completion", "payment_complete"),
        ]);
        let config =
            GatewayConfig::from_lookup(|key| values.get(key).map(|v| (*v).to_string())).unwrap();

        assert!(!config.enabled);
        assert_eq!(config.api_key, "25621898-6434-11ec-93c2-525401d2ddc2");
        assert_eq!(config.enable_for_methods, vec!["flat_rate:1", "local_pickup"]);
        assert_eq!(config.api_base_url, "https://kupay.test");
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.callback_completion, CallbackCompletion::PaymentComplete);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let only = |key: &'static str, value: &'static str| {
            move |k: &str| (k == key).then(|| value.to_string())
        };
        assert!(GatewayConfig::from_lookup(only("timeout_secs", "soon")).is_err());
        assert!(GatewayConfig::from_lookup(only("timeout_secs", "0")).is_err());
        assert!(GatewayConfig::from_lookup(only("enabled", "maybe")).is_err());
        assert!(GatewayConfig::from_lookup(only("callback_completion", "both")).is_err());
    }

    #[test]
    fn test_settings_round_trip() {
        let config = GatewayConfig {
            api_key: "abc".into(),
            enable_for_methods: vec!["flat_rate".into()],
            enable_for_virtual: false,
            ..Default::default()
        };
        let store = MemorySettingsStore::with_config(&config).unwrap();
        assert_eq!(GatewayConfig::from_settings(&store).unwrap(), config);
    }

    #[test]
    fn test_process_admin_options() {
        let store = MemorySettingsStore::new();
        let form = HashMap::from([
            ("api_key".to_string(), " key ".to_string()),
            ("title".to_string(), "Pay with crypto".to_string()),
            ("unknown".to_string(), "ignored".to_string()),
        ]);

        let config = GatewayConfig::process_admin_options(&store, &form).unwrap();
        assert_eq!(config.api_key, "key");
        assert_eq!(config.title, "Pay with crypto");
        assert_eq!(store.get(GATEWAY_ID, "unknown").unwrap(), None);
        assert_eq!(store.get(GATEWAY_ID, "api_key").unwrap().as_deref(), Some("key"));
    }

    #[test]
    fn test_invalid_admin_form_writes_nothing() {
        let store = MemorySettingsStore::new();
        let form = HashMap::from([("enabled".to_string(), "perhaps".to_string())]);

        assert!(GatewayConfig::process_admin_options(&store, &form).is_err());
        assert!(store.all(GATEWAY_ID).unwrap().is_empty());
    }

    #[test]
    fn test_api_key_field_is_write_only() {
        let fields = settings_fields();
        let api_key = fields.iter().find(|f| f.id == "api_key").unwrap();
        assert_eq!(api_key.kind, FieldKind::Password);
        assert!(api_key.write_only);
    }
}
