//! Default starting map for the GeoWar simulation.
//!
//! Nine western-European territories, all unclaimed, connected along their
//! land borders. Adjacency is symmetric.

use chrono::Utc;
use rust_decimal::Decimal;

use geowar_types::{
    GeoCoordinates, Resources, Territory, TerritoryId, TerritoryResources, TerritoryStatus,
};

use crate::state::WorldState;

/// Identifiers for all starting territories, returned alongside the world so
/// that callers can reference specific territories when seeding players.
#[derive(Debug, Clone, Copy)]
pub struct StartingTerritoryIds {
    /// France.
    pub france: TerritoryId,
    /// Germany.
    pub germany: TerritoryId,
    /// Spain.
    pub spain: TerritoryId,
    /// Portugal.
    pub portugal: TerritoryId,
    /// Italy.
    pub italy: TerritoryId,
    /// Switzerland.
    pub switzerland: TerritoryId,
    /// Austria.
    pub austria: TerritoryId,
    /// Belgium.
    pub belgium: TerritoryId,
    /// Netherlands.
    pub netherlands: TerritoryId,
}

/// Helper to build an unclaimed [`Territory`].
///
/// `gdp` is in billions; storage capacity scales with population.
fn territory(
    id: TerritoryId,
    name: &str,
    country_code: &str,
    population: u64,
    gdp: i64,
    (lat, lng): (f64, f64),
    neighbors: Vec<TerritoryId>,
) -> Territory {
    let now = Utc::now();
    let capacity = Decimal::from(population.checked_div(100).unwrap_or(0));
    let mut storage_capacity = Resources::ZERO;
    for kind in geowar_types::ResourceKind::ALL {
        *storage_capacity.get_mut(kind) = capacity;
    }
    Territory {
        id,
        name: name.to_string(),
        country_code: country_code.to_string(),
        owner_id: None,
        population,
        gdp: Decimal::from(gdp),
        military_power: 0,
        resources: TerritoryResources {
            stock: Resources::ZERO,
            production_rates: Resources::ZERO,
            storage_capacity,
        },
        buildings: Vec::new(),
        defenses: Vec::new(),
        coordinates: GeoCoordinates {
            lat,
            lng,
            bounds: None,
        },
        neighbors,
        status: TerritoryStatus::Neutral,
        created_at: now,
        updated_at: now,
    }
}

/// Create the default starting world.
///
/// Returns the world and the identifiers of its territories.
pub fn create_starting_world() -> (WorldState, StartingTerritoryIds) {
    let ids = StartingTerritoryIds {
        france: TerritoryId::new(),
        germany: TerritoryId::new(),
        spain: TerritoryId::new(),
        portugal: TerritoryId::new(),
        italy: TerritoryId::new(),
        switzerland: TerritoryId::new(),
        austria: TerritoryId::new(),
        belgium: TerritoryId::new(),
        netherlands: TerritoryId::new(),
    };

    let territories = vec![
        territory(
            ids.france,
            "France",
            "FR",
            68_000_000,
            2_780,
            (46.2276, 2.2137),
            vec![ids.germany, ids.spain, ids.italy, ids.switzerland, ids.belgium],
        ),
        territory(
            ids.germany,
            "Germany",
            "DE",
            84_000_000,
            4_080,
            (51.1657, 10.4515),
            vec![ids.france, ids.switzerland, ids.austria, ids.belgium, ids.netherlands],
        ),
        territory(
            ids.spain,
            "Spain",
            "ES",
            48_000_000,
            1_420,
            (40.4637, -3.7492),
            vec![ids.france, ids.portugal],
        ),
        territory(
            ids.portugal,
            "Portugal",
            "PT",
            10_000_000,
            250,
            (39.3999, -8.2245),
            vec![ids.spain],
        ),
        territory(
            ids.italy,
            "Italy",
            "IT",
            59_000_000,
            2_010,
            (41.8719, 12.5674),
            vec![ids.france, ids.switzerland, ids.austria],
        ),
        territory(
            ids.switzerland,
            "Switzerland",
            "CH",
            9_000_000,
            810,
            (46.8182, 8.2275),
            vec![ids.france, ids.germany, ids.italy, ids.austria],
        ),
        territory(
            ids.austria,
            "Austria",
            "AT",
            9_000_000,
            470,
            (47.5162, 14.5501),
            vec![ids.germany, ids.switzerland, ids.italy],
        ),
        territory(
            ids.belgium,
            "Belgium",
            "BE",
            12_000_000,
            580,
            (50.5039, 4.4699),
            vec![ids.france, ids.germany, ids.netherlands],
        ),
        territory(
            ids.netherlands,
            "Netherlands",
            "NL",
            18_000_000,
            1_010,
            (52.1326, 5.2913),
            vec![ids.germany, ids.belgium],
        ),
    ];

    let mut world = WorldState::new();
    for t in territories {
        world.upsert_territory(t);
    }

    tracing::info!(territories = world.territory_count(), "starting world created");
    (world, ids)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn starting_world_creates_nine_neutral_territories() {
        let (world, _ids) = create_starting_world();
        assert_eq!(world.territory_count(), 9);
        assert_eq!(world.neutral_territories().len(), 9);
        assert_eq!(world.army_count(), 0);
    }

    #[test]
    fn adjacency_is_symmetric_and_resolvable() {
        let (world, _ids) = create_starting_world();
        for t in world.territories() {
            for n in &t.neighbors {
                let neighbor = world.territory(*n).unwrap();
                assert!(neighbor.is_adjacent_to(t.id), "{} -> {}", t.name, neighbor.name);
            }
        }
    }

    #[test]
    fn portugal_only_borders_spain() {
        let (world, ids) = create_starting_world();
        let portugal = world.territory(ids.portugal).unwrap();
        assert_eq!(portugal.neighbors, vec![ids.spain]);
    }
}
