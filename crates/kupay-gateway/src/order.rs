//! Orders
//!
//! Order data is owned by the commerce host. The gateway only reads
//! snapshots and requests status transitions through [`OrderStore`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{GatewayError, Result};

/// Numeric order identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

const KEY_ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const KEY_LEN: usize = 13;

/// Unguessable order key (formatted: wc_order_XXXXXXXXXXXXX)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderKey(String);

impl OrderKey {
    /// Every order key starts with this prefix
    pub const PREFIX: &'static str = "wc_order_";

    /// Generate a new order key
    pub fn generate() -> Self {
        let bytes = uuid::Uuid::new_v4().into_bytes();

        // Bytes 6 and 8 hold the version and variant bits
        let mut entropy = bytes
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 6 && *i != 8)
            .fold(0u128, |acc, (_, b)| (acc << 8) | u128::from(*b));

        let mut key = String::with_capacity(Self::PREFIX.len() + KEY_LEN);
        key.push_str(Self::PREFIX);
        for _ in 0..KEY_LEN {
            key.push(char::from(KEY_ALPHABET[(entropy % 62) as usize]));
            entropy /= 62;
        }
        Self(key)
    }

    /// Wrap an existing key
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host order status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Processing,
    OnHold,
    Completed,
    Cancelled,
    Refunded,
    Failed,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::OnHold => "on-hold",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchased product line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub total: Decimal,

    /// Physical goods need shipping, virtual ones don't
    #[serde(default)]
    pub needs_shipping: bool,
}

/// A shipping method applied to the order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingLine {
    pub method_id: String,
    pub instance_id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub total: Decimal,
}

/// Order snapshot, serialized verbatim into the KuPay payload
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_key: OrderKey,
    pub status: OrderStatus,
    pub currency: String,
    pub total: Decimal,

    /// Gateway id chosen at checkout (e.g. "kupay")
    pub payment_method: String,

    #[serde(default)]
    pub billing_email: Option<String>,

    #[serde(default)]
    pub line_items: Vec<LineItem>,

    #[serde(default)]
    pub shipping_lines: Vec<ShippingLine>,

    pub date_created: DateTime<Utc>,

    #[serde(default)]
    pub date_paid: Option<DateTime<Utc>>,
}

impl Order {
    /// Whether any product in the order needs shipping
    pub fn needs_shipping(&self) -> bool {
        self.line_items.iter().any(|item| item.needs_shipping)
    }
}

/// Order contents as submitted at checkout
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OrderDraft {
    pub currency: String,
    pub payment_method: String,

    #[serde(default)]
    pub billing_email: Option<String>,

    #[serde(default)]
    pub line_items: Vec<LineItem>,

    #[serde(default)]
    pub shipping_lines: Vec<ShippingLine>,
}

/// Order storage trait (implemented by the commerce host)
pub trait OrderStore: Send + Sync {
    /// Get order by ID
    fn get(&self, id: OrderId) -> Result<Option<Order>>;

    /// Save or update an order
    fn save(&self, order: &Order) -> Result<()>;

    /// Transition an order to a new status
    fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        let mut order = self.get(id)?.ok_or(GatewayError::OrderNotFound(id))?;
        tracing::debug!(order_id = %id, from = %order.status, to = %status, "Order status changed");
        order.status = status;
        self.save(&order)
    }

    /// Mark an order paid, moving it to `status`
    ///
    /// `status` is the host's "payment complete" status after filters ran.
    fn payment_complete(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        let mut order = self.get(id)?.ok_or(GatewayError::OrderNotFound(id))?;
        order.status = status;
        order.date_paid = Some(Utc::now());
        self.save(&order)
    }
}

/// In-memory order store (for development and tests)
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
    next_id: AtomicU64,
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a pending order from a checkout draft
    pub fn create(&self, draft: OrderDraft) -> Result<Order> {
        let id = OrderId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let items: Decimal = draft.line_items.iter().map(|item| item.total).sum();
        let shipping: Decimal = draft.shipping_lines.iter().map(|line| line.total).sum();

        let order = Order {
            id,
            order_key: OrderKey::generate(),
            status: OrderStatus::Pending,
            currency: draft.currency,
            total: items + shipping,
            payment_method: draft.payment_method,
            billing_email: draft.billing_email,
            line_items: draft.line_items,
            shipping_lines: draft.shipping_lines,
            date_created: Utc::now(),
            date_paid: None,
        };

        self.save(&order)?;
        Ok(order)
    }

    /// Number of stored orders
    pub fn len(&self) -> usize {
        self.orders.read().map_or(0, |orders| orders.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OrderStore for MemoryOrderStore {
    fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let orders = self
            .orders
            .read()
            .map_err(|_| GatewayError::Storage("order store lock poisoned".into()))?;
        Ok(orders.get(&id).cloned())
    }

    fn save(&self, order: &Order) -> Result<()> {
        let mut orders = self
            .orders
            .write()
            .map_err(|_| GatewayError::Storage("order store lock poisoned".into()))?;
        orders.insert(order.id, order.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft() -> OrderDraft {
        OrderDraft {
            currency: "USD".into(),
            payment_method: "kupay".into(),
            billing_email: Some("buyer@example.com".into()),
            line_items: vec![LineItem {
                name: "T-shirt".into(),
                quantity: 2,
                total: dec!(40.00),
                needs_shipping: true,
            }],
            shipping_lines: vec![ShippingLine {
                method_id: "flat_rate".into(),
                instance_id: "3".into(),
                title: "Flat rate".into(),
                total: dec!(5.50),
            }],
        }
    }

    #[test]
    fn test_order_key_generation() {
        let key = OrderKey::generate();
        assert!(key.as_str().starts_with(OrderKey::PREFIX));
        assert_eq!(key.as_str().len(), OrderKey::PREFIX.len() + 13);
        assert_ne!(key, OrderKey::generate());
    }

    #[test]
    fn test_order_key_uses_every_position() {
        let keys: Vec<OrderKey> = (0..64).map(|_| OrderKey::generate()).collect();

        for key in &keys {
            let suffix = &key.as_str()[OrderKey::PREFIX.len()..];
            assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()), "{key}");
        }

        let last: std::collections::HashSet<char> = keys
            .iter()
            .filter_map(|key| key.as_str().chars().last())
            .collect();
        assert!(last.len() > 1, "last character never changes: {last:?}");
    }

    #[test]
    fn test_create_assigns_ids_and_totals() {
        let store = MemoryOrderStore::new();
        let first = store.create(draft()).unwrap();
        let second = store.create(draft()).unwrap();

        assert_eq!(first.id, OrderId(1));
        assert_eq!(second.id, OrderId(2));
        assert_eq!(first.total, dec!(45.50));
        assert_eq!(first.status, OrderStatus::Pending);
        assert!(first.needs_shipping());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_status_transitions() {
        let store = MemoryOrderStore::new();
        let order = store.create(draft()).unwrap();

        store.update_status(order.id, OrderStatus::Processing).unwrap();
        assert_eq!(store.get(order.id).unwrap().unwrap().status, OrderStatus::Processing);

        store.payment_complete(order.id, OrderStatus::Completed).unwrap();
        let paid = store.get(order.id).unwrap().unwrap();
        assert_eq!(paid.status, OrderStatus::Completed);
        assert!(paid.date_paid.is_some());
    }

    #[test]
    fn test_update_unknown_order() {
        let store = MemoryOrderStore::new();
        let result = store.update_status(OrderId(99), OrderStatus::Completed);
        assert!(matches!(result, Err(GatewayError::OrderNotFound(OrderId(99)))));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&OrderStatus::OnHold).unwrap(), "\"on-hold\"");
        assert_eq!(OrderStatus::Completed.to_string(), "completed");
    }
}
