//! The canonical in-memory world: players, territories, armies, alliances,
//! battles and events.
//!
//! [`WorldState`] owns every entity instance. Its fields are private; the
//! mutation methods below are the only write path, and each one leaves the
//! store consistent on return:
//!
//! - every army's `location` references a stored territory,
//! - no stored army is dissolved (zero total quantity),
//! - `Territory::military_power` equals the power of the armies on it,
//! - finished battles never change,
//! - a player belongs to at most one alliance and no stored alliance is
//!   empty.
//!
//! A player's territories and armies are never stored on the player; they
//! are the derived queries [`WorldState::territories_of_player`] and
//! [`WorldState::armies_of_player`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use geowar_combat::army_power;
use geowar_types::{
    Alliance, AllianceId, Army, ArmyId, Battle, BattleId, BattleStatus, Entity, GameEvent, GameEventId, Notification,
    Player, PlayerId, Territory, TerritoryId, TerritoryStatus, WorldSnapshot,
};

use crate::error::WorldError;

/// What happened to an army handed to [`WorldState::upsert_army`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmyUpsert {
    /// The army was stored.
    Stored,
    /// The army had no units left and was removed instead.
    Dissolved,
}

/// Summary of a [`WorldState::remove_player`] cascade.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerRemoval {
    /// The removed player record, `None` when the id was unknown.
    pub player: Option<Player>,
    /// Armies deleted with the player.
    pub armies_removed: Vec<ArmyId>,
    /// Territories returned to neutral.
    pub territories_released: Vec<TerritoryId>,
    /// The alliance the player was dismissed from.
    pub alliance_left: Option<AllianceId>,
}

/// The canonical world graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldState {
    players: BTreeMap<PlayerId, Player>,
    territories: BTreeMap<TerritoryId, Territory>,
    armies: BTreeMap<ArmyId, Army>,
    alliances: BTreeMap<AllianceId, Alliance>,
    battles: BTreeMap<BattleId, Battle>,
    events: BTreeMap<GameEventId, GameEvent>,
    /// Notifications created as side effects, waiting to be delivered.
    outbox: Vec<Notification>,
}

impl WorldState {
    /// Create an empty world.
    pub const fn new() -> Self {
        Self {
            players: BTreeMap::new(),
            territories: BTreeMap::new(),
            armies: BTreeMap::new(),
            alliances: BTreeMap::new(),
            battles: BTreeMap::new(),
            events: BTreeMap::new(),
            outbox: Vec::new(),
        }
    }

    // -------------------------------------------------------------------
    // Players
    // -------------------------------------------------------------------

    /// Insert or replace a player. Returns the previous record.
    pub fn upsert_player(&mut self, player: Player) -> Option<Player> {
        self.players.insert(player.id, player)
    }

    /// Remove a player and cascade: their armies are deleted, every
    /// territory they owned reverts to unowned and neutral, and they leave
    /// their alliance.
    ///
    /// Unknown ids are a no-op.
    pub fn remove_player(&mut self, id: PlayerId, now: DateTime<Utc>) -> PlayerRemoval {
        let player = self.players.remove(&id);

        let armies_removed: Vec<ArmyId> = self
            .armies
            .values()
            .filter(|army| army.owner_id == id)
            .map(|army| army.id)
            .collect();
        for army_id in &armies_removed {
            self.remove_army(*army_id);
        }

        let territories_released: Vec<TerritoryId> = self
            .territories
            .values()
            .filter(|t| t.owner_id == Some(id))
            .map(|t| t.id)
            .collect();
        for territory_id in &territories_released {
            if let Some(territory) = self.territories.get_mut(territory_id) {
                territory.owner_id = None;
                territory.status = TerritoryStatus::Neutral;
                territory.touch(now);
            }
        }

        let alliance_left = self.leave_alliance(id, now);

        if player.is_some() || !armies_removed.is_empty() || !territories_released.is_empty() {
            tracing::info!(
                player_id = %id,
                armies = armies_removed.len(),
                territories = territories_released.len(),
                "player removed"
            );
        }

        PlayerRemoval {
            player,
            armies_removed,
            territories_released,
            alliance_left,
        }
    }

    // -------------------------------------------------------------------
    // Territories
    // -------------------------------------------------------------------

    /// Insert or replace a territory. Returns the previous record.
    ///
    /// `military_power` is derived by the store and overwritten from the
    /// armies stationed on the territory.
    pub fn upsert_territory(&mut self, mut territory: Territory) -> Option<Territory> {
        territory.military_power = self.stationed_power(territory.id);
        self.territories.insert(territory.id, territory)
    }

    /// Remove a territory.
    ///
    /// Refused with [`WorldError::TerritoryOccupied`] while armies are
    /// stationed on it. Unknown ids are a no-op.
    pub fn remove_territory(&mut self, id: TerritoryId) -> Result<Option<Territory>, WorldError> {
        let stationed = self.armies.values().filter(|a| a.location == id).count();
        if stationed > 0 {
            return Err(WorldError::TerritoryOccupied {
                territory: id,
                armies: stationed,
            });
        }
        Ok(self.territories.remove(&id))
    }

    /// Change a territory's owner, keeping `owner == None` exactly when the
    /// status is `neutral`.
    pub fn set_territory_owner(
        &mut self,
        id: TerritoryId,
        owner: Option<PlayerId>,
        now: DateTime<Utc>,
    ) -> Result<(), WorldError> {
        let territory = self
            .territories
            .get_mut(&id)
            .ok_or(WorldError::TerritoryNotFound(id))?;
        territory.owner_id = owner;
        territory.status = if owner.is_some() {
            TerritoryStatus::Owned
        } else {
            TerritoryStatus::Neutral
        };
        territory.touch(now);
        Ok(())
    }

    // -------------------------------------------------------------------
    // Armies
    // -------------------------------------------------------------------

    /// Insert or replace an army.
    ///
    /// Zero-quantity unit stacks are pruned first. An army with no units
    /// left is removed instead of stored. The location must reference a
    /// stored territory.
    pub fn upsert_army(&mut self, mut army: Army) -> Result<ArmyUpsert, WorldError> {
        if !self.territories.contains_key(&army.location) {
            return Err(WorldError::TerritoryNotFound(army.location));
        }

        army.prune_empty_units();
        if army.is_dissolved() {
            tracing::debug!(army_id = %army.id, "army dissolved");
            self.remove_army(army.id);
            return Ok(ArmyUpsert::Dissolved);
        }

        let new_location = army.location;
        let old_location = self.armies.insert(army.id, army).map(|prev| prev.location);

        self.refresh_power(new_location);
        if let Some(old) = old_location.filter(|old| *old != new_location) {
            self.refresh_power(old);
        }
        Ok(ArmyUpsert::Stored)
    }

    /// Remove an army. Unknown ids are a no-op.
    pub fn remove_army(&mut self, id: ArmyId) -> Option<Army> {
        let removed = self.armies.remove(&id);
        if let Some(army) = &removed {
            self.refresh_power(army.location);
        }
        removed
    }

    // -------------------------------------------------------------------
    // Alliances
    // -------------------------------------------------------------------

    /// Insert or replace an alliance. Returns the previous record.
    ///
    /// Members of the incoming alliance are dismissed from any other
    /// alliance first, and alliances left empty by that are removed. An
    /// alliance with no members is removed instead of stored.
    pub fn upsert_alliance(&mut self, alliance: Alliance, now: DateTime<Utc>) -> Option<Alliance> {
        for member in &alliance.members {
            let elsewhere = self
                .alliance_of(member.player_id)
                .map(|a| a.id)
                .filter(|id| *id != alliance.id);
            if let Some(other) = elsewhere {
                self.dismiss_from(other, member.player_id, now);
            }
        }
        if alliance.is_empty() {
            tracing::debug!(alliance_id = %alliance.id, "alliance disbanded");
            return self.alliances.remove(&alliance.id);
        }
        self.alliances.insert(alliance.id, alliance)
    }

    /// Remove an alliance. Unknown ids are a no-op.
    pub fn remove_alliance(&mut self, id: AllianceId) -> Option<Alliance> {
        self.alliances.remove(&id)
    }

    /// Dismiss `player` from their alliance, removing it when nobody is
    /// left. Returns the alliance they left.
    pub fn leave_alliance(&mut self, player: PlayerId, now: DateTime<Utc>) -> Option<AllianceId> {
        let id = self.alliance_of(player)?.id;
        self.dismiss_from(id, player, now);
        Some(id)
    }

    // -------------------------------------------------------------------
    // Battles
    // -------------------------------------------------------------------

    /// Insert or replace a battle.
    ///
    /// A stored battle that is already finished cannot be replaced with a
    /// different value.
    pub fn upsert_battle(&mut self, battle: Battle) -> Result<Option<Battle>, WorldError> {
        if let Some(stored) = self.battles.get(&battle.id)
            && stored.status == BattleStatus::Finished
            && *stored != battle
        {
            return Err(WorldError::BattleFinished(battle.id));
        }
        Ok(self.battles.insert(battle.id, battle))
    }

    /// Remove a battle. Unknown ids are a no-op.
    pub fn remove_battle(&mut self, id: BattleId) -> Option<Battle> {
        self.battles.remove(&id)
    }

    // -------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------

    /// Insert or replace a world event.
    pub fn upsert_event(&mut self, event: GameEvent) -> Option<GameEvent> {
        self.events.insert(event.id, event)
    }

    /// Remove a world event. Unknown ids are a no-op.
    pub fn remove_event(&mut self, id: GameEventId) -> Option<GameEvent> {
        self.events.remove(&id)
    }

    /// Mark every active event whose lifetime has elapsed at `now` as
    /// inactive. Returns the ids that expired.
    pub fn expire_events(&mut self, now: DateTime<Utc>) -> Vec<GameEventId> {
        let mut expired = Vec::new();
        for event in self.events.values_mut() {
            if event.is_active && event.has_expired(now) {
                event.is_active = false;
                event.touch(now);
                expired.push(event.id);
            }
        }
        expired
    }

    // -------------------------------------------------------------------
    // Notifications
    // -------------------------------------------------------------------

    /// Queue a notification for delivery.
    pub fn push_notification(&mut self, notification: Notification) {
        self.outbox.push(notification);
    }

    /// Take every queued notification.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    /// Notifications waiting for delivery.
    pub fn pending_notifications(&self) -> &[Notification] {
        &self.outbox
    }

    // -------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------

    /// Look up a player.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Look up a territory.
    pub fn territory(&self, id: TerritoryId) -> Option<&Territory> {
        self.territories.get(&id)
    }

    /// Look up an army.
    pub fn army(&self, id: ArmyId) -> Option<&Army> {
        self.armies.get(&id)
    }

    /// Look up an alliance.
    pub fn alliance(&self, id: AllianceId) -> Option<&Alliance> {
        self.alliances.get(&id)
    }

    /// Look up a battle.
    pub fn battle(&self, id: BattleId) -> Option<&Battle> {
        self.battles.get(&id)
    }

    /// Look up a world event.
    pub fn event(&self, id: GameEventId) -> Option<&GameEvent> {
        self.events.get(&id)
    }

    /// All players in id order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// All territories in id order.
    pub fn territories(&self) -> impl Iterator<Item = &Territory> {
        self.territories.values()
    }

    /// All armies in id order.
    pub fn armies(&self) -> impl Iterator<Item = &Army> {
        self.armies.values()
    }

    /// All alliances in id order.
    pub fn alliances(&self) -> impl Iterator<Item = &Alliance> {
        self.alliances.values()
    }

    /// All battles in id order.
    pub fn battles(&self) -> impl Iterator<Item = &Battle> {
        self.battles.values()
    }

    /// All world events in id order.
    pub fn events(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.values()
    }

    // -------------------------------------------------------------------
    // Derived queries
    // -------------------------------------------------------------------

    /// Armies stationed on `territory`.
    pub fn armies_in_territory(&self, territory: TerritoryId) -> Vec<&Army> {
        self.armies
            .values()
            .filter(|a| a.location == territory)
            .collect()
    }

    /// Armies commanded by `player`.
    pub fn armies_of_player(&self, player: PlayerId) -> Vec<&Army> {
        self.armies
            .values()
            .filter(|a| a.owner_id == player)
            .collect()
    }

    /// Territories owned by `player`.
    pub fn territories_of_player(&self, player: PlayerId) -> Vec<&Territory> {
        self.territories
            .values()
            .filter(|t| t.owner_id == Some(player))
            .collect()
    }

    /// The alliance `player` belongs to.
    pub fn alliance_of(&self, player: PlayerId) -> Option<&Alliance> {
        self.alliances.values().find(|a| a.is_member(player))
    }

    /// Whether two different players share an alliance.
    pub fn are_allied(&self, a: PlayerId, b: PlayerId) -> bool {
        a != b && self.alliance_of(a).is_some_and(|alliance| alliance.is_member(b))
    }

    /// Territories without an owner.
    pub fn neutral_territories(&self) -> Vec<&Territory> {
        self.territories
            .values()
            .filter(|t| t.owner_id.is_none())
            .collect()
    }

    /// Battles currently being fought (`in_progress`).
    pub fn active_battles(&self) -> Vec<&Battle> {
        self.battles_with_status(BattleStatus::InProgress)
    }

    /// Battles in the given lifecycle state.
    pub fn battles_with_status(&self, status: BattleStatus) -> Vec<&Battle> {
        self.battles
            .values()
            .filter(|b| b.status == status)
            .collect()
    }

    /// World events still in effect.
    pub fn active_events(&self) -> Vec<&GameEvent> {
        self.events.values().filter(|e| e.is_active).collect()
    }

    /// Active events touching `territory`.
    pub fn active_events_for(&self, territory: TerritoryId) -> Vec<&GameEvent> {
        self.events
            .values()
            .filter(|e| e.is_active && e.affects(territory))
            .collect()
    }

    /// Combined power of every army `player` commands.
    pub fn player_military_power(&self, player: PlayerId) -> u64 {
        self.armies
            .values()
            .filter(|a| a.owner_id == player)
            .map(|a| army_power(&a.units))
            .fold(0_u64, u64::saturating_add)
    }

    /// Number of players.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Number of territories.
    pub fn territory_count(&self) -> usize {
        self.territories.len()
    }

    /// Number of armies.
    pub fn army_count(&self) -> usize {
        self.armies.len()
    }

    /// Number of alliances.
    pub fn alliance_count(&self) -> usize {
        self.alliances.len()
    }

    /// Number of battles.
    pub fn battle_count(&self) -> usize {
        self.battles.len()
    }

    /// Number of world events.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    // -------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------

    /// Copy the full entity set.
    pub fn to_snapshot(&self, tick: u64) -> WorldSnapshot {
        WorldSnapshot {
            tick,
            players: self.players.values().cloned().collect(),
            territories: self.territories.values().cloned().collect(),
            armies: self.armies.values().cloned().collect(),
            battles: self.battles.values().cloned().collect(),
            events: self.events.values().cloned().collect(),
            alliances: self.alliances.values().cloned().collect(),
        }
    }

    /// Build a world from a snapshot, re-validating every army.
    pub fn from_snapshot(snapshot: WorldSnapshot) -> Result<Self, WorldError> {
        let mut state = Self::new();
        state.load_snapshot(snapshot)?;
        Ok(state)
    }

    /// Replace every entity with the snapshot's contents.
    ///
    /// The notification outbox is kept. On error the store is left
    /// unchanged.
    pub fn load_snapshot(&mut self, snapshot: WorldSnapshot) -> Result<(), WorldError> {
        let mut next = Self::new();
        for player in snapshot.players {
            next.upsert_player(player);
        }
        for territory in snapshot.territories {
            next.upsert_territory(territory);
        }
        for army in snapshot.armies {
            next.upsert_army(army)?;
        }
        for battle in snapshot.battles {
            next.battles.insert(battle.id, battle);
        }
        for event in snapshot.events {
            next.upsert_event(event);
        }
        for alliance in snapshot.alliances {
            let stamped = alliance.updated_at;
            next.upsert_alliance(alliance, stamped);
        }
        next.outbox = std::mem::take(&mut self.outbox);
        *self = next;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------

    fn stationed_power(&self, territory: TerritoryId) -> u64 {
        self.armies
            .values()
            .filter(|a| a.location == territory)
            .map(|a| army_power(&a.units))
            .fold(0_u64, u64::saturating_add)
    }

    fn dismiss_from(&mut self, id: AllianceId, player: PlayerId, now: DateTime<Utc>) {
        let Some(alliance) = self.alliances.get_mut(&id) else {
            return;
        };
        if !alliance.dismiss(player) {
            return;
        }
        alliance.touch(now);
        if alliance.is_empty() {
            self.alliances.remove(&id);
            tracing::debug!(alliance_id = %id, "alliance disbanded");
        }
    }

    fn refresh_power(&mut self, territory: TerritoryId) {
        let power = self.stationed_power(territory);
        if let Some(t) = self.territories.get_mut(&territory) {
            t.military_power = power;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use geowar_types::{
        ArmyStatus, BattleSide, GameEventType, GeoCoordinates, Resources, TerritoryResources,
        Unit, UnitId, UnitType,
    };
    use rust_decimal::Decimal;

    use super::*;

    fn territory(owner: Option<PlayerId>) -> Territory {
        let now = Utc::now();
        Territory {
            id: TerritoryId::new(),
            name: String::from("T"),
            country_code: String::from("TT"),
            owner_id: owner,
            population: 1000,
            gdp: Decimal::ONE_HUNDRED,
            military_power: 0,
            resources: TerritoryResources::default(),
            buildings: Vec::new(),
            defenses: Vec::new(),
            coordinates: GeoCoordinates::default(),
            neighbors: Vec::new(),
            status: if owner.is_some() {
                TerritoryStatus::Owned
            } else {
                TerritoryStatus::Neutral
            },
            created_at: now,
            updated_at: now,
        }
    }

    fn army(owner: PlayerId, location: TerritoryId, quantity: u32) -> Army {
        let now = Utc::now();
        Army {
            id: ArmyId::new(),
            name: String::from("A"),
            owner_id: owner,
            units: vec![Unit {
                id: UnitId::new(),
                unit_type: UnitType::Infantry,
                quantity,
                health: 100,
                attack: 2,
                defense: 3,
                speed: 1,
                upkeep_cost: Resources::ZERO,
                created_at: now,
                updated_at: now,
            }],
            location,
            status: ArmyStatus::Idle,
            morale: 100,
            experience: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn removing_a_player_cascades() {
        let mut world = WorldState::new();
        let ada = Player::new("ada", Utc::now());
        let bob = Player::new("bob", Utc::now());
        let (ada_id, bob_id) = (ada.id, bob.id);
        world.upsert_player(ada);
        world.upsert_player(bob);

        let owned: Vec<TerritoryId> = (0..3)
            .map(|_| {
                let t = territory(Some(ada_id));
                let id = t.id;
                world.upsert_territory(t);
                id
            })
            .collect();
        let theirs = territory(Some(bob_id));
        let theirs_id = theirs.id;
        world.upsert_territory(theirs);

        for location in owned.iter().take(2).copied().chain([theirs_id]) {
            world.upsert_army(army(ada_id, location, 10)).unwrap();
        }
        world.upsert_army(army(bob_id, theirs_id, 10)).unwrap();

        let removal = world.remove_player(ada_id, Utc::now());
        assert_eq!(removal.armies_removed.len(), 3);
        assert_eq!(removal.territories_released.len(), 3);
        assert!(world.armies_of_player(ada_id).is_empty());
        for id in owned {
            let t = world.territory(id).unwrap();
            assert_eq!(t.owner_id, None);
            assert_eq!(t.status, TerritoryStatus::Neutral);
            assert_eq!(t.military_power, 0);
        }
        assert_eq!(world.armies_of_player(bob_id).len(), 1);
        assert_eq!(world.territory(theirs_id).unwrap().military_power, 50);
    }

    #[test]
    fn one_alliance_per_player() {
        let now = Utc::now();
        let mut world = WorldState::new();
        let (ada, bob, cy) = (PlayerId::new(), PlayerId::new(), PlayerId::new());
        let mut first = Alliance::found("Entente", "ENT", ada, now);
        first.admit(bob, now);
        let first_id = first.id;
        world.upsert_alliance(first, now);
        assert!(world.are_allied(ada, bob));
        assert!(!world.are_allied(ada, ada));
        assert!(!world.are_allied(ada, cy));

        // bob founds a rival alliance and leaves the first one
        let mut second = Alliance::found("Axis", "AX", cy, now);
        second.admit(bob, now);
        let second_id = second.id;
        world.upsert_alliance(second, now);
        assert_eq!(world.alliance_of(bob).map(|a| a.id), Some(second_id));
        assert!(!world.are_allied(ada, bob));
        assert_eq!(world.alliance(first_id).unwrap().members.len(), 1);

        // the last member leaving disbands the alliance
        assert_eq!(world.leave_alliance(ada, now), Some(first_id));
        assert!(world.alliance(first_id).is_none());
        assert_eq!(world.alliance_count(), 1);
    }

    #[test]
    fn removed_player_leaves_their_alliance() {
        let now = Utc::now();
        let mut world = WorldState::new();
        let ada = Player::new("ada", now);
        let ada_id = ada.id;
        world.upsert_player(ada);
        let bob = PlayerId::new();
        let mut alliance = Alliance::found("Entente", "ENT", ada_id, now);
        alliance.admit(bob, now);
        let alliance_id = alliance.id;
        world.upsert_alliance(alliance, now);

        let removal = world.remove_player(ada_id, now);
        assert_eq!(removal.alliance_left, Some(alliance_id));
        let alliance = world.alliance(alliance_id).unwrap();
        assert_eq!(alliance.leader_id, bob);

        let snapshot = world.to_snapshot(3);
        assert_eq!(snapshot.alliances.len(), 1);
        let reloaded = WorldState::from_snapshot(snapshot).unwrap();
        assert_eq!(reloaded.alliance_of(bob).map(|a| a.id), Some(alliance_id));
    }

    #[test]
    fn removals_of_unknown_ids_are_noops() {
        let mut world = WorldState::new();
        let removal = world.remove_player(PlayerId::new(), Utc::now());
        assert_eq!(removal, PlayerRemoval::default());
        assert!(world.remove_army(ArmyId::new()).is_none());
        assert!(world.remove_territory(TerritoryId::new()).unwrap().is_none());
        assert!(world.remove_battle(BattleId::new()).is_none());
        assert!(world.remove_event(GameEventId::new()).is_none());
        assert!(world.remove_alliance(AllianceId::new()).is_none());
        assert!(world.leave_alliance(PlayerId::new(), Utc::now()).is_none());
    }

    #[test]
    fn army_location_must_exist() {
        let mut world = WorldState::new();
        let err = world.upsert_army(army(PlayerId::new(), TerritoryId::new(), 5));
        assert!(matches!(err, Err(WorldError::TerritoryNotFound(_))));
        assert_eq!(world.army_count(), 0);
    }

    #[test]
    fn empty_army_is_removed_not_stored() {
        let mut world = WorldState::new();
        let t = territory(None);
        let tid = t.id;
        world.upsert_territory(t);
        let mut a = army(PlayerId::new(), tid, 5);
        world.upsert_army(a.clone()).unwrap();
        assert_eq!(world.territory(tid).unwrap().military_power, 25);

        a.units.first_mut().unwrap().quantity = 0;
        assert_eq!(world.upsert_army(a.clone()).unwrap(), ArmyUpsert::Dissolved);
        assert!(world.army(a.id).is_none());
        assert_eq!(world.territory(tid).unwrap().military_power, 0);
    }

    #[test]
    fn moving_an_army_refreshes_both_territories() {
        let mut world = WorldState::new();
        let (from, to) = (territory(None), territory(None));
        let (from_id, to_id) = (from.id, to.id);
        world.upsert_territory(from);
        world.upsert_territory(to);
        let mut a = army(PlayerId::new(), from_id, 4);
        world.upsert_army(a.clone()).unwrap();

        a.location = to_id;
        world.upsert_army(a).unwrap();
        assert_eq!(world.territory(from_id).unwrap().military_power, 0);
        assert_eq!(world.territory(to_id).unwrap().military_power, 20);
    }

    #[test]
    fn occupied_territory_cannot_be_removed() {
        let mut world = WorldState::new();
        let t = territory(None);
        let tid = t.id;
        world.upsert_territory(t);
        world.upsert_army(army(PlayerId::new(), tid, 1)).unwrap();
        assert!(matches!(
            world.remove_territory(tid),
            Err(WorldError::TerritoryOccupied { armies: 1, .. })
        ));
    }

    #[test]
    fn ownership_helper_keeps_status_consistent() {
        let mut world = WorldState::new();
        let t = territory(None);
        let tid = t.id;
        world.upsert_territory(t);
        let owner = PlayerId::new();

        world.set_territory_owner(tid, Some(owner), Utc::now()).unwrap();
        assert_eq!(world.territory(tid).unwrap().status, TerritoryStatus::Owned);
        assert_eq!(world.territories_of_player(owner).len(), 1);

        world.set_territory_owner(tid, None, Utc::now()).unwrap();
        assert_eq!(world.territory(tid).unwrap().status, TerritoryStatus::Neutral);
        assert_eq!(world.neutral_territories().len(), 1);
    }

    #[test]
    fn finished_battles_are_frozen() {
        let mut world = WorldState::new();
        let t = territory(None);
        let a = army(PlayerId::new(), t.id, 3);
        let d = army(PlayerId::new(), t.id, 3);
        let mut battle =
            geowar_combat::declare(&a, &d, BattleSide::Neutral, t.id, Utc::now());
        battle.status = BattleStatus::Finished;
        world.upsert_battle(battle.clone()).unwrap();
        assert!(world.upsert_battle(battle.clone()).is_ok());

        battle.status = BattleStatus::InProgress;
        assert!(matches!(world.upsert_battle(battle), Err(WorldError::BattleFinished(_))));
        assert!(world.active_battles().is_empty());
    }

    #[test]
    fn events_expire_strictly_after_duration() {
        let mut world = WorldState::new();
        let created = Utc::now();
        let event = GameEvent {
            id: GameEventId::new(),
            event_type: GameEventType::EconomicBoom,
            title: String::from("Boom"),
            description: String::new(),
            affected_territories: Vec::new(),
            duration_hours: 1,
            effects: Vec::new(),
            is_active: true,
            created_at: created,
            updated_at: created,
        };
        world.upsert_event(event);

        assert!(world.expire_events(created + chrono::Duration::hours(1)).is_empty());
        let expired = world.expire_events(created + chrono::Duration::minutes(61));
        assert_eq!(expired.len(), 1);
        assert!(world.active_events().is_empty());
        assert_eq!(world.event_count(), 1);
    }

    #[test]
    fn snapshot_reload_keeps_outbox() {
        let mut world = WorldState::new();
        let t = territory(None);
        let tid = t.id;
        world.upsert_territory(t);
        world.upsert_army(army(PlayerId::new(), tid, 2)).unwrap();
        let snapshot = world.to_snapshot(9);

        world.push_notification(Notification::new(
            PlayerId::new(),
            geowar_types::NotificationType::Achievement,
            "hi",
            "there",
            Utc::now(),
        ));
        world.load_snapshot(snapshot.clone()).unwrap();
        assert_eq!(world.pending_notifications().len(), 1);
        assert_eq!(world.to_snapshot(9), snapshot);

        let mut broken = snapshot;
        broken.territories.clear();
        assert!(world.load_snapshot(broken).is_err());
        assert_eq!(world.territory_count(), 1);
    }
}
