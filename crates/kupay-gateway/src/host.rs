//! Host Platform Collaborators
//!
//! Cart access and storefront URL building. The commerce host owns both;
//! the gateway receives them explicitly instead of reaching for globals.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{GatewayError, Result};
use crate::order::{Order, OrderId};

/// Route the KuPay callback is served on
pub const CALLBACK_ROUTE: &str = "callback";

/// A shipping rate chosen for one cart package
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRate {
    pub method_id: String,
    pub instance_id: String,
}

impl ShippingRate {
    pub fn new(method_id: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            method_id: method_id.into(),
            instance_id: instance_id.into(),
        }
    }
}

/// Shopper cart trait
pub trait Cart: Send + Sync {
    /// Whether anything in the cart needs shipping
    fn needs_shipping(&self) -> bool;

    /// Rates chosen for each shipping package
    fn chosen_shipping_rates(&self) -> Vec<ShippingRate>;

    fn is_empty(&self) -> bool;

    /// Remove everything from the cart
    fn empty(&self);
}

#[derive(Default)]
struct CartContents {
    items: usize,
    needs_shipping: bool,
    rates: Vec<ShippingRate>,
}

/// In-memory cart (for development and tests)
#[derive(Default)]
pub struct MemoryCart {
    contents: RwLock<CartContents>,
    clears: AtomicUsize,
}

impl MemoryCart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cart holding `items` products with the given shipping selection
    pub fn with_items(items: usize, needs_shipping: bool, rates: Vec<ShippingRate>) -> Self {
        Self {
            contents: RwLock::new(CartContents {
                items,
                needs_shipping,
                rates,
            }),
            clears: AtomicUsize::new(0),
        }
    }

    /// How many times the cart has been emptied
    pub fn times_emptied(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl Cart for MemoryCart {
    fn needs_shipping(&self) -> bool {
        self.contents
            .read()
            .is_ok_and(|c| c.items > 0 && c.needs_shipping)
    }

    fn chosen_shipping_rates(&self) -> Vec<ShippingRate> {
        self.contents
            .read()
            .map(|c| c.rates.clone())
            .unwrap_or_default()
    }

    fn is_empty(&self) -> bool {
        self.contents.read().map_or(true, |c| c.items == 0)
    }

    fn empty(&self) {
        if let Ok(mut contents) = self.contents.write() {
            *contents = CartContents::default();
        }
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

/// Storefront URL builder
#[derive(Clone, Debug)]
pub struct SiteUrls {
    base: Url,
}

impl SiteUrls {
    /// Create from the store's home URL
    pub fn new(home_url: &str) -> Result<Self> {
        let mut base = Url::parse(home_url)
            .map_err(|e| GatewayError::Config(format!("invalid site URL '{home_url}': {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    pub const fn home(&self) -> &Url {
        &self.base
    }

    fn join(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| GatewayError::Http(format!("cannot build URL for '{path}': {e}")))
    }

    /// Path of the order-received ("thank you") page, sans query
    pub fn order_received_path(id: OrderId) -> String {
        format!("checkout/order-received/{id}/")
    }

    /// Order-received page, authorised by the order key
    pub fn order_received_url(&self, order: &Order) -> Result<Url> {
        let mut url = self.join(&Self::order_received_path(order.id))?;
        url.query_pairs_mut().append_pair("key", order.order_key.as_str());
        Ok(url)
    }

    /// Page where the shopper can pick a payment method again
    pub fn checkout_payment_url(&self, order: &Order) -> Result<Url> {
        let mut url = self.join(&format!("checkout/order-pay/{}/", order.id))?;
        url.query_pairs_mut()
            .append_pair("pay_for_order", "true")
            .append_pair("key", order.order_key.as_str());
        Ok(url)
    }

    /// Callback URL handed to KuPay
    pub fn callback_url(&self, order: &Order) -> Result<Url> {
        let mut url = self.join(CALLBACK_ROUTE)?;
        url.query_pairs_mut().append_pair("key", order.order_key.as_str());
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{MemoryOrderStore, OrderDraft};

    fn order() -> Order {
        MemoryOrderStore::new()
            .create(OrderDraft {
                currency: "EUR".into(),
                payment_method: "kupay".into(),
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn test_order_urls() {
        let urls = SiteUrls::new("https://shop.example/store").unwrap();
        let order = order();
        let key = order.order_key.as_str();

        assert_eq!(
            urls.order_received_url(&order).unwrap().as_str(),
            format!("https://shop.example/store/checkout/order-received/1/?key={key}")
        );
        assert_eq!(
            urls.checkout_payment_url(&order).unwrap().as_str(),
            format!("https://shop.example/store/checkout/order-pay/1/?pay_for_order=true&key={key}")
        );
        assert_eq!(
            urls.callback_url(&order).unwrap().as_str(),
            format!("https://shop.example/store/callback?key={key}")
        );
    }

    #[test]
    fn test_invalid_site_url() {
        assert!(matches!(SiteUrls::new("not a url"), Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_memory_cart() {
        let cart = MemoryCart::with_items(2, true, vec![ShippingRate::new("flat_rate", "1")]);
        assert!(cart.needs_shipping());
        assert!(!cart.is_empty());

        cart.empty();
        assert!(cart.is_empty());
        assert!(!cart.needs_shipping());
        assert!(cart.chosen_shipping_rates().is_empty());
        assert_eq!(cart.times_emptied(), 1);
    }
}
