//! Shipping Method Restrictions
//!
//! Rate ids are compared in the canonical `method_id:instance_id` form.
//! A restriction entry without an instance (`flat_rate`) matches every
//! instance of that method.

use serde::{Deserialize, Serialize};

use crate::host::ShippingRate;
use crate::order::ShippingLine;

/// Canonical rate ids for an order's shipping lines
pub fn order_rate_ids(lines: &[ShippingLine]) -> Vec<String> {
    lines
        .iter()
        .map(|line| format!("{}:{}", line.method_id, line.instance_id))
        .collect()
}

/// Canonical rate ids for the rates chosen per cart package
pub fn package_rate_ids(rates: &[ShippingRate]) -> Vec<String> {
    rates
        .iter()
        .map(|rate| format!("{}:{}", rate.method_id, rate.instance_id))
        .collect()
}

fn before_colon(rate_id: &str) -> &str {
    rate_id.split_once(':').map_or(rate_id, |(method, _)| method)
}

/// Restriction entries matched by any of `rate_ids`
///
/// Exact `method_id:instance_id` matches come first, then entries matched
/// on the method id alone. Duplicates are dropped.
pub fn matching_rates(enabled_for: &[String], rate_ids: &[String]) -> Vec<String> {
    let methods: Vec<&str> = rate_ids.iter().map(|id| before_colon(id)).collect();

    let exact = enabled_for.iter().filter(|e| rate_ids.contains(e));
    let by_method = enabled_for.iter().filter(|e| methods.contains(&e.as_str()));

    let mut matched: Vec<String> = Vec::new();
    for entry in exact.chain(by_method) {
        if !matched.contains(entry) {
            matched.push(entry.clone());
        }
    }
    matched
}

/// A shipping method type registered with the host (e.g. flat rate)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShippingMethod {
    pub id: String,
    pub title: String,
}

/// A configured instance of a method inside a zone
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShippingMethodInstance {
    pub instance_id: u32,
    pub method_id: String,
    pub title: String,
}

impl ShippingMethodInstance {
    pub fn rate_id(&self) -> String {
        format!("{}:{}", self.method_id, self.instance_id)
    }
}

/// Shipping zone; zone 0 covers locations not in any other zone
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShippingZone {
    pub id: u32,
    pub name: String,
    pub methods: Vec<ShippingMethodInstance>,
}

/// Host-side shipping configuration
pub trait ShippingCatalog: Send + Sync {
    /// Registered method types
    fn methods(&self) -> Vec<ShippingMethod>;

    /// Zones, including zone 0
    fn zones(&self) -> Vec<ShippingZone>;
}

/// Fixed catalog (for development and tests)
#[derive(Clone, Debug, Default)]
pub struct StaticShippingCatalog {
    pub methods: Vec<ShippingMethod>,
    pub zones: Vec<ShippingZone>,
}

impl ShippingCatalog for StaticShippingCatalog {
    fn methods(&self) -> Vec<ShippingMethod> {
        self.methods.clone()
    }

    fn zones(&self) -> Vec<ShippingZone> {
        self.zones.clone()
    }
}

/// One selectable entry of the "enable for shipping methods" field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOption {
    pub id: String,
    pub label: String,
}

/// Options grouped under a method title
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOptionGroup {
    pub title: String,
    pub options: Vec<ShippingOption>,
}

/// Build the admin option list for the method restriction field
pub fn shipping_method_options(catalog: &dyn ShippingCatalog) -> Vec<ShippingOptionGroup> {
    let zones = catalog.zones();

    catalog
        .methods()
        .into_iter()
        .map(|method| {
            let mut options = vec![ShippingOption {
                id: method.id.clone(),
                label: format!("Any \"{}\" method", method.title),
            }];

            for zone in &zones {
                let zone_name = if zone.id == 0 {
                    "Other locations"
                } else {
                    zone.name.as_str()
                };

                options.extend(
                    zone.methods
                        .iter()
                        .filter(|instance| instance.method_id == method.id)
                        .map(|instance| ShippingOption {
                            id: instance.rate_id(),
                            label: format!(
                                "{zone_name} \u{2013} {} (#{})",
                                instance.title, instance.instance_id
                            ),
                        }),
                );
            }

            ShippingOptionGroup {
                title: method.title,
                options,
            }
        })
        .collect()
}
