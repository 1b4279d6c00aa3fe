//! Resource vectors.
//!
//! [`Resources`] is the dense seven-kind vector used for balances, upkeep and
//! production deltas. [`ResourceBonus`] is the sparse form used by building
//! production bonuses and costs, where most kinds are absent.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::enums::ResourceKind;

/// A dense vector holding one [`Decimal`] amount per [`ResourceKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Resources {
    /// Gold.
    #[ts(as = "String")]
    pub gold: Decimal,
    /// Oil.
    #[ts(as = "String")]
    pub oil: Decimal,
    /// Steel.
    #[ts(as = "String")]
    pub steel: Decimal,
    /// Food.
    #[ts(as = "String")]
    pub food: Decimal,
    /// Uranium.
    #[ts(as = "String")]
    pub uranium: Decimal,
    /// Rare-earth metals.
    #[ts(as = "String")]
    pub rare_earth: Decimal,
    /// Electricity.
    #[ts(as = "String")]
    pub electricity: Decimal,
}

impl Resources {
    /// The all-zero vector.
    pub const ZERO: Self = Self {
        gold: Decimal::ZERO,
        oil: Decimal::ZERO,
        steel: Decimal::ZERO,
        food: Decimal::ZERO,
        uranium: Decimal::ZERO,
        rare_earth: Decimal::ZERO,
        electricity: Decimal::ZERO,
    };

    /// Amount held for `kind`.
    pub const fn get(&self, kind: ResourceKind) -> Decimal {
        match kind {
            ResourceKind::Gold => self.gold,
            ResourceKind::Oil => self.oil,
            ResourceKind::Steel => self.steel,
            ResourceKind::Food => self.food,
            ResourceKind::Uranium => self.uranium,
            ResourceKind::RareEarth => self.rare_earth,
            ResourceKind::Electricity => self.electricity,
        }
    }

    /// Mutable access to the amount held for `kind`.
    pub const fn get_mut(&mut self, kind: ResourceKind) -> &mut Decimal {
        match kind {
            ResourceKind::Gold => &mut self.gold,
            ResourceKind::Oil => &mut self.oil,
            ResourceKind::Steel => &mut self.steel,
            ResourceKind::Food => &mut self.food,
            ResourceKind::Uranium => &mut self.uranium,
            ResourceKind::RareEarth => &mut self.rare_earth,
            ResourceKind::Electricity => &mut self.electricity,
        }
    }

    /// Iterate `(kind, amount)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, Decimal)> + '_ {
        ResourceKind::ALL.into_iter().map(|kind| (kind, self.get(kind)))
    }

    /// Whether every amount is zero.
    pub fn is_zero(&self) -> bool {
        self.iter().all(|(_, amount)| amount.is_zero())
    }
}

impl FromIterator<(ResourceKind, Decimal)> for Resources {
    fn from_iter<T: IntoIterator<Item = (ResourceKind, Decimal)>>(iter: T) -> Self {
        let mut out = Self::ZERO;
        for (kind, amount) in iter {
            *out.get_mut(kind) = amount;
        }
        out
    }
}

/// Sparse per-resource amounts (production bonuses, costs, rewards).
///
/// Inbound maps may carry keys this build does not know about; those are
/// dropped during deserialization instead of failing the whole payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ResourceBonus(
    #[serde(deserialize_with = "deserialize_known_kinds")]
    #[ts(as = "BTreeMap<ResourceKind, String>")]
    pub BTreeMap<ResourceKind, Decimal>,
);

impl ResourceBonus {
    /// An empty bonus.
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Amount for `kind`, zero when absent.
    pub fn get(&self, kind: ResourceKind) -> Decimal {
        self.0.get(&kind).copied().unwrap_or(Decimal::ZERO)
    }

    /// Set the amount for `kind`.
    pub fn set(&mut self, kind: ResourceKind, amount: Decimal) {
        self.0.insert(kind, amount);
    }

    /// Iterate the present entries.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, Decimal)> + '_ {
        self.0.iter().map(|(kind, amount)| (*kind, *amount))
    }

    /// Whether no entry is present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(ResourceKind, Decimal)> for ResourceBonus {
    fn from_iter<T: IntoIterator<Item = (ResourceKind, Decimal)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Resources> for ResourceBonus {
    fn from(resources: Resources) -> Self {
        resources
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .collect()
    }
}

fn deserialize_known_kinds<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<ResourceKind, Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Decimal>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, amount)| key.parse::<ResourceKind>().ok().map(|kind| (kind, amount)))
        .collect())
}

/// Resource state held by a territory: the stock itself plus production and
/// storage metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TerritoryResources {
    /// Resources currently stockpiled on the territory.
    #[serde(flatten)]
    pub stock: Resources,
    /// Production credited during the most recent tick.
    pub production_rates: Resources,
    /// Maximum stock per resource.
    pub storage_capacity: Resources,
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn get_mut_writes_the_named_field() {
        let mut res = Resources::ZERO;
        *res.get_mut(ResourceKind::RareEarth) = dec!(4);
        assert_eq!(res.rare_earth, dec!(4));
        assert_eq!(res.get(ResourceKind::RareEarth), dec!(4));
        assert!(!res.is_zero());
    }

    #[test]
    fn bonus_drops_unknown_keys() {
        let json = r#"{"gold": "5", "plutonium": "9", "rareEarth": "1.5"}"#;
        let bonus: ResourceBonus = serde_json::from_str(json).unwrap_or_default();
        assert_eq!(bonus.get(ResourceKind::Gold), dec!(5));
        assert_eq!(bonus.get(ResourceKind::RareEarth), dec!(1.5));
        assert_eq!(bonus.iter().count(), 2);
    }

    #[test]
    fn territory_resources_flatten_stock() {
        let mut tr = TerritoryResources::default();
        tr.stock.oil = dec!(12);
        let value = serde_json::to_value(tr).unwrap_or_default();
        assert_eq!(value.get("oil").and_then(|v| v.as_str()), Some("12"));
        assert!(value.get("productionRates").is_some());
    }
}
