//! Reconciliation of optimistic local changes with canonical updates.
//!
//! Local intents are applied to the store at once and recorded in the
//! [`PendingTable`] together with the canonical value they replaced. Canonical
//! updates from the push channel always win: an update echoing a pending
//! operation either confirms the optimistic value or corrects it, and
//! updates whose sequence number is not newer than the last one applied to
//! the same entity are ignored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use geowar_core::commands::{self, CommandError, CommandOutcome};
use geowar_types::{
    ArmyId, BattleEnded, BattleStatus, Command, Entity, EntityRef, EntitySnapshot, OperationId,
    PushEnvelope, PushMessage, SnapshotRequest, WorldSnapshot,
};
use geowar_world::WorldState;

use crate::error::SyncError;
use crate::pending::PendingTable;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A local change applied ahead of the authority.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalMutation {
    /// Insert or replace an entity.
    Upsert(Box<EntitySnapshot>),
    /// Remove an entity.
    Remove(EntityRef),
}

impl LocalMutation {
    /// Insert or replace `snapshot`.
    pub fn upsert(snapshot: EntitySnapshot) -> Self {
        Self::Upsert(Box::new(snapshot))
    }

    /// Entity the mutation touches.
    pub fn entity(&self) -> EntityRef {
        match self {
            Self::Upsert(snapshot) => snapshot.entity_ref(),
            Self::Remove(entity) => *entity,
        }
    }
}

/// An optimistic value the authority disagreed with.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    /// Operation whose guess was wrong.
    pub op_id: OperationId,
    /// Corrected entity.
    pub entity: EntityRef,
    /// What was applied locally.
    pub optimistic: Option<EntitySnapshot>,
    /// What the authority decided, now in the store.
    pub canonical: Option<EntitySnapshot>,
}

/// Effect of one canonical frame on the local store.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Applied with no pending operation involved.
    Applied,
    /// The authority agreed with the optimistic value.
    Confirmed {
        /// Confirmed operation.
        op_id: OperationId,
        /// Entity the confirmation covers.
        entity: EntityRef,
    },
    /// The authority overrode the optimistic value.
    Corrected(Box<Correction>),
    /// The frame was not newer than what the store already holds.
    Stale {
        /// Sequence number of the ignored frame.
        sequence: u64,
        /// Sequence last applied to the same entity.
        last_seen: u64,
    },
    /// Chat or notification, not stored.
    Forwarded,
    /// The whole world was replaced from a snapshot.
    Resynced {
        /// Operations whose optimistic values were dropped.
        discarded: Vec<OperationId>,
    },
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Tracks pending operations and per-entity sequence numbers.
#[derive(Debug, Default)]
pub struct Reconciler {
    pending: PendingTable,
    last_seen: BTreeMap<EntityRef, u64>,
    /// Sequence of the last snapshot; nothing at or below it is newer.
    floor: u64,
    /// Highest sequence applied or forwarded.
    watermark: u64,
}

impl Reconciler {
    /// Create a reconciler that has seen nothing.
    pub const fn new() -> Self {
        Self {
            pending: PendingTable::new(),
            last_seen: BTreeMap::new(),
            floor: 0,
            watermark: 0,
        }
    }

    /// Pending optimistic entries.
    pub const fn pending(&self) -> &PendingTable {
        &self.pending
    }

    /// Highest sequence number applied so far.
    pub const fn watermark(&self) -> u64 {
        self.watermark
    }

    /// What to ask for after (re)connecting.
    pub const fn snapshot_request(&self) -> SnapshotRequest {
        if self.watermark == 0 {
            SnapshotRequest::Full
        } else {
            SnapshotRequest::Since {
                sequence: self.watermark,
            }
        }
    }

    /// Apply a single local mutation optimistically.
    ///
    /// Returns the id of an older operation whose guess on the same entity
    /// was superseded.
    pub fn apply_local(
        &mut self,
        world: &mut WorldState,
        op_id: OperationId,
        mutation: LocalMutation,
        now: DateTime<Utc>,
    ) -> Result<Option<OperationId>, SyncError> {
        let entity = mutation.entity();
        let baseline = read_snapshot(world, entity);
        match mutation {
            LocalMutation::Upsert(snapshot) => store_snapshot(world, *snapshot, false)?,
            LocalMutation::Remove(entity) => remove_entity(world, entity, now)?,
        }
        let optimistic = read_snapshot(world, entity);
        Ok(self.track(op_id, entity, baseline, optimistic))
    }

    /// Run a player intent against the local store and record every entity
    /// it touched as pending under `op_id`.
    ///
    /// A rejected intent leaves both the store and the table untouched.
    pub fn submit(
        &mut self,
        world: &mut WorldState,
        op_id: OperationId,
        command: &Command,
        now: DateTime<Utc>,
    ) -> Result<CommandOutcome, CommandError> {
        let baselines: BTreeMap<EntityRef, Option<EntitySnapshot>> = touched_by(world, command)
            .into_iter()
            .map(|entity| (entity, read_snapshot(world, entity)))
            .collect();

        let outcome = commands::execute(world, command, now)?;

        let mut entities: Vec<EntityRef> = baselines.keys().copied().collect();
        entities.extend(outcome.affected());
        entities.sort_unstable();
        entities.dedup();
        for entity in entities {
            let baseline = baselines.get(&entity).cloned().flatten();
            let optimistic = read_snapshot(world, entity);
            self.track(op_id, entity, baseline, optimistic);
        }
        debug!(op_id = %op_id, pending = self.pending.len(), "Intent applied locally");
        Ok(outcome)
    }

    /// Restore the canonical baseline of every entity pending under `op_id`.
    ///
    /// Used when the authority rejects an intent. Returns the restored
    /// entities.
    pub fn rollback(
        &mut self,
        world: &mut WorldState,
        op_id: OperationId,
        now: DateTime<Utc>,
    ) -> Result<Vec<EntityRef>, SyncError> {
        let entries = self.pending.take_op(op_id);
        let mut restored = Vec::with_capacity(entries.len());
        for (entity, entry) in entries {
            match entry.baseline {
                Some(snapshot) => store_snapshot(world, snapshot, true)?,
                None => remove_entity(world, entity, now)?,
            }
            restored.push(entity);
        }
        info!(op_id = %op_id, entities = restored.len(), "Operation rolled back");
        Ok(restored)
    }

    /// Apply one canonical frame from the push channel.
    pub fn apply_canonical(
        &mut self,
        world: &mut WorldState,
        envelope: PushEnvelope,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, SyncError> {
        let PushEnvelope {
            sequence,
            op_id,
            message,
        } = envelope;

        let change = match CanonicalChange::from_message(message) {
            CanonicalChange::Forward => {
                if sequence <= self.watermark {
                    debug!(sequence, watermark = self.watermark, "Replayed message not forwarded");
                    return Ok(ReconcileOutcome::Stale {
                        sequence,
                        last_seen: self.watermark,
                    });
                }
                self.watermark = sequence;
                return Ok(ReconcileOutcome::Forwarded);
            }
            CanonicalChange::Snapshot(snapshot) => return self.resync(world, sequence, *snapshot),
            change => change,
        };

        let Some(entity) = change.entity() else {
            return Ok(ReconcileOutcome::Applied);
        };
        let last_seen = self.last_seen_for(entity);
        if sequence <= last_seen {
            debug!(%entity, sequence, last_seen, "Stale canonical update ignored");
            return Ok(ReconcileOutcome::Stale {
                sequence,
                last_seen,
            });
        }

        change.apply(world, now)?;
        self.last_seen.insert(entity, sequence);
        self.watermark = self.watermark.max(sequence);
        let canonical = read_snapshot(world, entity);

        let Some(entry) = self.pending.get(entity) else {
            return Ok(ReconcileOutcome::Applied);
        };
        if op_id != Some(entry.op_id) {
            self.pending.rebase(entity, canonical);
            return Ok(ReconcileOutcome::Applied);
        }

        let Some(entry) = self.pending.resolve(entity) else {
            return Ok(ReconcileOutcome::Applied);
        };
        let agrees = match (&entry.optimistic, &canonical) {
            (None, None) => true,
            (Some(optimistic), Some(canonical)) => optimistic.same_state(canonical),
            _ => false,
        };
        if agrees {
            debug!(op_id = %entry.op_id, %entity, "Optimistic value confirmed");
            Ok(ReconcileOutcome::Confirmed {
                op_id: entry.op_id,
                entity,
            })
        } else {
            warn!(op_id = %entry.op_id, %entity, "Optimistic value corrected by authority");
            Ok(ReconcileOutcome::Corrected(Box::new(Correction {
                op_id: entry.op_id,
                entity,
                optimistic: entry.optimistic,
                canonical,
            })))
        }
    }

    fn resync(
        &mut self,
        world: &mut WorldState,
        sequence: u64,
        snapshot: WorldSnapshot,
    ) -> Result<ReconcileOutcome, SyncError> {
        if self.floor > 0 && sequence <= self.floor {
            debug!(sequence, floor = self.floor, "Stale snapshot ignored");
            return Ok(ReconcileOutcome::Stale {
                sequence,
                last_seen: self.floor,
            });
        }
        world.load_snapshot(snapshot)?;
        let discarded = self.pending.clear();
        self.last_seen.clear();
        self.floor = sequence;
        self.watermark = self.watermark.max(sequence);
        info!(sequence, discarded = discarded.len(), "World resynced from snapshot");
        Ok(ReconcileOutcome::Resynced { discarded })
    }

    fn track(
        &mut self,
        op_id: OperationId,
        entity: EntityRef,
        baseline: Option<EntitySnapshot>,
        optimistic: Option<EntitySnapshot>,
    ) -> Option<OperationId> {
        let superseded = self.pending.record(op_id, entity, baseline, optimistic);
        if let Some(old) = superseded {
            debug!(%entity, superseded = %old, op_id = %op_id, "Pending guess superseded");
        }
        superseded
    }

    fn last_seen_for(&self, entity: EntityRef) -> u64 {
        self.last_seen
            .get(&entity)
            .copied()
            .unwrap_or(0)
            .max(self.floor)
    }
}

// ---------------------------------------------------------------------------
// Canonical changes
// ---------------------------------------------------------------------------

enum CanonicalChange {
    Upsert(Box<EntitySnapshot>),
    Remove(EntityRef),
    FinishBattle(Box<BattleEnded>),
    Snapshot(Box<WorldSnapshot>),
    Forward,
}

impl CanonicalChange {
    fn upsert(snapshot: EntitySnapshot) -> Self {
        Self::Upsert(Box::new(snapshot))
    }

    fn from_message(message: PushMessage) -> Self {
        match message {
            PushMessage::PlayerJoined(player) => Self::upsert(EntitySnapshot::Player(player)),
            PushMessage::PlayerLeft(left) => Self::Remove(EntityRef::Player(left.player_id)),
            PushMessage::TerritoryUpdated(territory) => {
                Self::upsert(EntitySnapshot::Territory(territory))
            }
            PushMessage::ArmyUpdated(army) => Self::upsert(EntitySnapshot::Army(army)),
            PushMessage::ArmyDisbanded(gone) => Self::Remove(EntityRef::Army(gone.army_id)),
            PushMessage::BattleStarted(battle) | PushMessage::BattleUpdated(battle) => {
                Self::upsert(EntitySnapshot::Battle(battle))
            }
            PushMessage::BattleEnded(ended) => Self::FinishBattle(ended),
            PushMessage::GameEvent(event) => Self::upsert(EntitySnapshot::GameEvent(event)),
            PushMessage::AllianceUpdated(alliance) => {
                Self::upsert(EntitySnapshot::Alliance(alliance))
            }
            PushMessage::AllianceDisbanded(gone) => {
                Self::Remove(EntityRef::Alliance(gone.alliance_id))
            }
            PushMessage::StateSnapshot(snapshot) => Self::Snapshot(snapshot),
            PushMessage::ChatMessage(_) | PushMessage::Notification(_) => Self::Forward,
        }
    }

    fn entity(&self) -> Option<EntityRef> {
        match self {
            Self::Upsert(snapshot) => Some(snapshot.entity_ref()),
            Self::Remove(entity) => Some(*entity),
            Self::FinishBattle(ended) => Some(EntityRef::Battle(ended.battle_id)),
            Self::Snapshot(_) | Self::Forward => None,
        }
    }

    fn apply(self, world: &mut WorldState, now: DateTime<Utc>) -> Result<(), SyncError> {
        match self {
            Self::Upsert(snapshot) => store_snapshot(world, *snapshot, true),
            Self::Remove(entity) => remove_entity(world, entity, now),
            Self::FinishBattle(ended) => {
                let BattleEnded { battle_id, result } = *ended;
                let Some(mut battle) = world.battle(battle_id).cloned() else {
                    debug!(battle_id = %battle_id, "Result for unknown battle ignored");
                    return Ok(());
                };
                battle.status = BattleStatus::Finished;
                battle.result = Some(result);
                battle.touch(now);
                store_snapshot(world, EntitySnapshot::Battle(Box::new(battle)), true)
            }
            Self::Snapshot(_) | Self::Forward => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Store helpers
// ---------------------------------------------------------------------------

/// Entities an intent may change that already exist before it runs.
fn touched_by(world: &WorldState, command: &Command) -> Vec<EntityRef> {
    let army_refs = |army_id: ArmyId| {
        let mut refs = vec![EntityRef::Army(army_id)];
        if let Some(army) = world.army(army_id) {
            refs.push(EntityRef::Territory(army.location));
        }
        refs
    };
    match command {
        Command::CreateArmy { player_id, .. } => vec![EntityRef::Player(*player_id)],
        Command::MoveArmy {
            army_id, target, ..
        }
        | Command::Attack {
            army_id, target, ..
        } => {
            let mut refs = army_refs(*army_id);
            refs.push(EntityRef::Territory(*target));
            refs
        }
        Command::RecruitUnits {
            player_id, army_id, ..
        } => {
            let mut refs = army_refs(*army_id);
            refs.push(EntityRef::Player(*player_id));
            refs
        }
        Command::DisbandArmy { army_id, .. } => army_refs(*army_id),
        Command::BuildStructure {
            player_id,
            territory_id,
            ..
        }
        | Command::BuildDefense {
            player_id,
            territory_id,
            ..
        } => vec![
            EntityRef::Player(*player_id),
            EntityRef::Territory(*territory_id),
        ],
        Command::CreateAlliance { .. } => Vec::new(),
        Command::JoinAlliance { alliance_id, .. } => vec![EntityRef::Alliance(*alliance_id)],
        Command::LeaveAlliance { player_id } => world
            .alliance_of(*player_id)
            .map(|alliance| EntityRef::Alliance(alliance.id))
            .into_iter()
            .collect(),
    }
}

/// Current stored value of `entity`.
pub fn read_snapshot(world: &WorldState, entity: EntityRef) -> Option<EntitySnapshot> {
    match entity {
        EntityRef::Player(id) => world.player(id).cloned().map(EntitySnapshot::Player),
        EntityRef::Territory(id) => world
            .territory(id)
            .cloned()
            .map(|t| EntitySnapshot::Territory(Box::new(t))),
        EntityRef::Army(id) => world.army(id).cloned().map(EntitySnapshot::Army),
        EntityRef::Battle(id) => world
            .battle(id)
            .cloned()
            .map(|b| EntitySnapshot::Battle(Box::new(b))),
        EntityRef::GameEvent(id) => world.event(id).cloned().map(EntitySnapshot::GameEvent),
        EntityRef::Alliance(id) => world.alliance(id).cloned().map(EntitySnapshot::Alliance),
    }
}

/// Write a snapshot into the store. `authoritative` lets a canonical value
/// replace a battle that is already finished locally.
fn store_snapshot(
    world: &mut WorldState,
    snapshot: EntitySnapshot,
    authoritative: bool,
) -> Result<(), SyncError> {
    match snapshot {
        EntitySnapshot::Player(player) => {
            world.upsert_player(player);
        }
        EntitySnapshot::Territory(territory) => {
            world.upsert_territory(*territory);
        }
        EntitySnapshot::Army(army) => {
            world.upsert_army(army)?;
        }
        EntitySnapshot::Battle(battle) => {
            let finished = world
                .battle(battle.id)
                .is_some_and(|stored| stored.status == BattleStatus::Finished);
            if authoritative && finished {
                world.remove_battle(battle.id);
            }
            world.upsert_battle(*battle)?;
        }
        EntitySnapshot::GameEvent(event) => {
            world.upsert_event(event);
        }
        EntitySnapshot::Alliance(alliance) => {
            let stamped = alliance.updated_at;
            world.upsert_alliance(alliance, stamped);
        }
    }
    Ok(())
}

fn remove_entity(
    world: &mut WorldState,
    entity: EntityRef,
    now: DateTime<Utc>,
) -> Result<(), SyncError> {
    match entity {
        EntityRef::Player(id) => {
            world.remove_player(id, now);
        }
        EntityRef::Territory(id) => {
            world.remove_territory(id)?;
        }
        EntityRef::Army(id) => {
            world.remove_army(id);
        }
        EntityRef::Battle(id) => {
            world.remove_battle(id);
        }
        EntityRef::GameEvent(id) => {
            world.remove_event(id);
        }
        EntityRef::Alliance(id) => {
            world.remove_alliance(id);
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;
    use geowar_types::{
        Alliance, AllianceDisbanded, BattleResult, Notification, NotificationType, Player, PlayerId, Resources, TerritoryId,
        UnitOrder, UnitType, Winner,
    };
    use geowar_world::{StartingTerritoryIds, create_starting_world};
    use rust_decimal_macros::dec;

    use super::*;

    fn setup() -> (WorldState, StartingTerritoryIds, PlayerId) {
        let now = Utc::now();
        let (mut world, ids) = create_starting_world();
        let mut player = Player::new("ada", now);
        player.resources = Resources {
            gold: dec!(10000),
            food: dec!(5000),
            ..Resources::ZERO
        };
        let player_id = player.id;
        world.upsert_player(player);
        world.set_territory_owner(ids.france, Some(player_id), now).unwrap();
        (world, ids, player_id)
    }

    fn later() -> DateTime<Utc> {
        Utc::now().checked_add_signed(TimeDelta::seconds(30)).unwrap()
    }

    fn envelope(sequence: u64, op_id: Option<OperationId>, message: PushMessage) -> PushEnvelope {
        PushEnvelope {
            sequence,
            op_id,
            message,
        }
    }

    fn create_army(player_id: PlayerId, location: TerritoryId) -> Command {
        Command::CreateArmy {
            player_id,
            name: "Vanguard".to_string(),
            location,
            units: vec![UnitOrder {
                unit_type: UnitType::Infantry,
                quantity: 10,
            }],
        }
    }

    fn territory_update(world: &WorldState, id: TerritoryId, population: u64) -> PushMessage {
        let mut territory = world.territory(id).cloned().unwrap();
        territory.population = population;
        PushMessage::TerritoryUpdated(Box::new(territory))
    }

    #[test]
    fn stale_replay_is_a_no_op() {
        let (mut world, ids, _) = setup();
        let mut reconciler = Reconciler::new();

        let first = territory_update(&world, ids.belgium, 1);
        let outcome = reconciler
            .apply_canonical(&mut world, envelope(5, None, first), Utc::now())
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied);

        let replay = territory_update(&world, ids.belgium, 2);
        let outcome = reconciler
            .apply_canonical(&mut world, envelope(5, None, replay), Utc::now())
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Stale {
                sequence: 5,
                last_seen: 5
            }
        );
        assert_eq!(world.territory(ids.belgium).unwrap().population, 1);
        assert_eq!(reconciler.watermark(), 5);
    }

    #[test]
    fn authority_confirms_submitted_intent() {
        let (mut world, ids, player_id) = setup();
        let mut reconciler = Reconciler::new();
        let op = OperationId::new();

        let outcome = reconciler
            .submit(&mut world, op, &create_army(player_id, ids.france), Utc::now())
            .unwrap();
        let army_id = outcome.created_army().unwrap();
        assert_eq!(reconciler.pending().entities_of(op).len(), 2);

        let mut army = world.army(army_id).cloned().unwrap();
        army.touch(later());
        let confirmed = reconciler
            .apply_canonical(&mut world, envelope(1, Some(op), PushMessage::ArmyUpdated(army)), Utc::now())
            .unwrap();
        assert_eq!(
            confirmed,
            ReconcileOutcome::Confirmed {
                op_id: op,
                entity: EntityRef::Army(army_id)
            }
        );

        let player = world.player(player_id).cloned().unwrap();
        let confirmed = reconciler
            .apply_canonical(&mut world, envelope(2, Some(op), PushMessage::PlayerJoined(player)), Utc::now())
            .unwrap();
        assert!(matches!(confirmed, ReconcileOutcome::Confirmed { .. }));
        assert!(reconciler.pending().is_empty());
    }

    #[test]
    fn authority_corrects_a_wrong_guess() {
        let (mut world, _, player_id) = setup();
        let mut reconciler = Reconciler::new();
        let op = OperationId::new();

        let mut guess = world.player(player_id).cloned().unwrap();
        guess.reputation = 5;
        reconciler
            .apply_local(&mut world, op, LocalMutation::upsert(EntitySnapshot::Player(guess)), Utc::now())
            .unwrap();
        assert_eq!(world.player(player_id).unwrap().reputation, 5);

        let mut canonical = world.player(player_id).cloned().unwrap();
        canonical.reputation = 3;
        let outcome = reconciler
            .apply_canonical(&mut world, envelope(1, Some(op), PushMessage::PlayerJoined(canonical)), Utc::now())
            .unwrap();

        let correction = match outcome {
            ReconcileOutcome::Corrected(correction) => Some(correction),
            _ => None,
        }
        .unwrap();
        assert_eq!(correction.op_id, op);
        assert_eq!(world.player(player_id).unwrap().reputation, 3);
        assert!(reconciler.pending().is_empty());
    }

    #[test]
    fn superseded_guess_rolls_back_to_first_baseline() {
        let (mut world, _, player_id) = setup();
        let mut reconciler = Reconciler::new();
        let original = world.player(player_id).cloned().unwrap();
        let first = OperationId::new();
        let second = OperationId::new();

        let mut guess = original.clone();
        guess.reputation = 1;
        let superseded = reconciler
            .apply_local(&mut world, first, LocalMutation::upsert(EntitySnapshot::Player(guess.clone())), Utc::now())
            .unwrap();
        assert_eq!(superseded, None);

        guess.reputation = 2;
        let superseded = reconciler
            .apply_local(&mut world, second, LocalMutation::upsert(EntitySnapshot::Player(guess)), Utc::now())
            .unwrap();
        assert_eq!(superseded, Some(first));
        assert_eq!(reconciler.pending().len(), 1);

        let restored = reconciler.rollback(&mut world, second, Utc::now()).unwrap();
        assert_eq!(restored, vec![EntityRef::Player(player_id)]);
        assert_eq!(world.player(player_id), Some(&original));
    }

    #[test]
    fn leaving_an_alliance_rolls_back_and_canonical_disband_removes_it() {
        let (mut world, _, player_id) = setup();
        let now = Utc::now();
        let alliance = Alliance::found("Entente", "ENT", player_id, now);
        let alliance_id = alliance.id;
        world.upsert_alliance(alliance.clone(), now);
        let mut reconciler = Reconciler::new();
        let op = OperationId::new();

        reconciler
            .submit(&mut world, op, &Command::LeaveAlliance { player_id }, now)
            .unwrap();
        assert!(world.alliance(alliance_id).is_none());
        assert!(reconciler.pending().contains_op(op));

        let restored = reconciler.rollback(&mut world, op, now).unwrap();
        assert_eq!(restored, vec![EntityRef::Alliance(alliance_id)]);
        assert_eq!(world.alliance(alliance_id), Some(&alliance));

        let gone = PushMessage::AllianceDisbanded(AllianceDisbanded { alliance_id });
        let outcome = reconciler
            .apply_canonical(&mut world, envelope(2, None, gone), now)
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied);
        assert!(world.alliance_of(player_id).is_none());
    }

    #[test]
    fn rollback_removes_created_army_and_refunds() {
        let (mut world, ids, player_id) = setup();
        let mut reconciler = Reconciler::new();
        let op = OperationId::new();
        let before = world.player(player_id).cloned().unwrap();

        let army_id = reconciler
            .submit(&mut world, op, &create_army(player_id, ids.france), Utc::now())
            .unwrap()
            .created_army()
            .unwrap();
        assert_ne!(world.player(player_id), Some(&before));

        reconciler.rollback(&mut world, op, Utc::now()).unwrap();
        assert!(world.army(army_id).is_none());
        assert_eq!(world.player(player_id), Some(&before));
        assert_eq!(world.territory(ids.france).unwrap().military_power, 0);
        assert!(!reconciler.pending().contains_op(op));
    }

    #[test]
    fn rejected_intent_records_nothing() {
        let (mut world, ids, player_id) = setup();
        let mut reconciler = Reconciler::new();
        let before = world.clone();

        let result = reconciler.submit(
            &mut world,
            OperationId::new(),
            &create_army(player_id, ids.germany),
            Utc::now(),
        );
        assert!(matches!(result, Err(CommandError::NotTerritoryOwner { .. })));
        assert_eq!(world, before);
        assert!(reconciler.pending().is_empty());
    }

    #[test]
    fn foreign_update_rebases_the_pending_baseline() {
        let (mut world, _, player_id) = setup();
        let mut reconciler = Reconciler::new();
        let op = OperationId::new();

        let mut guess = world.player(player_id).cloned().unwrap();
        guess.reputation = 5;
        reconciler
            .apply_local(&mut world, op, LocalMutation::upsert(EntitySnapshot::Player(guess)), Utc::now())
            .unwrap();

        let mut foreign = world.player(player_id).cloned().unwrap();
        foreign.reputation = 7;
        let outcome = reconciler
            .apply_canonical(&mut world, envelope(1, None, PushMessage::PlayerJoined(foreign)), Utc::now())
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied);
        assert_eq!(world.player(player_id).unwrap().reputation, 7);

        reconciler.rollback(&mut world, op, Utc::now()).unwrap();
        assert_eq!(world.player(player_id).unwrap().reputation, 7);
    }

    #[test]
    fn snapshot_discards_pending_and_raises_the_floor() {
        let (mut world, ids, player_id) = setup();
        let mut reconciler = Reconciler::new();
        assert_eq!(reconciler.snapshot_request(), SnapshotRequest::Full);

        let op = OperationId::new();
        reconciler
            .submit(&mut world, op, &create_army(player_id, ids.france), Utc::now())
            .unwrap();

        let (fresh, _) = create_starting_world();
        let snapshot = PushMessage::StateSnapshot(Box::new(fresh.to_snapshot(40)));
        let outcome = reconciler
            .apply_canonical(&mut world, envelope(10, None, snapshot), Utc::now())
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Resynced { discarded: vec![op] });
        assert_eq!(world.army_count(), 0);
        assert_eq!(world.player_count(), 0);

        let (other, other_ids) = create_starting_world();
        let old = territory_update(&other, other_ids.spain, 3);
        let outcome = reconciler
            .apply_canonical(&mut world, envelope(9, None, old), Utc::now())
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Stale {
                sequence: 9,
                last_seen: 10
            }
        );
        assert_eq!(reconciler.snapshot_request(), SnapshotRequest::Since { sequence: 10 });
    }

    #[test]
    fn battle_ended_finishes_the_stored_battle() {
        let (mut world, ids, player_id) = setup();
        let mut reconciler = Reconciler::new();
        let army_id = commands::execute(&mut world, &create_army(player_id, ids.france), Utc::now())
            .unwrap()
            .created_army()
            .unwrap();

        let op = OperationId::new();
        let attack = Command::Attack {
            player_id,
            army_id,
            target: ids.belgium,
        };
        let battle_id = reconciler
            .submit(&mut world, op, &attack, Utc::now())
            .unwrap()
            .declared_battle()
            .unwrap();

        let ended = BattleEnded {
            battle_id,
            result: BattleResult {
                winner: Winner::Attacker,
                territory_conquered: true,
                attacker_remaining_units: Vec::new(),
                defender_remaining_units: Vec::new(),
                rewards: geowar_types::ResourceBonus::new(),
            },
        };
        let outcome = reconciler
            .apply_canonical(
                &mut world,
                envelope(3, None, PushMessage::BattleEnded(Box::new(ended))),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied);

        let battle = world.battle(battle_id).unwrap();
        assert_eq!(battle.status, BattleStatus::Finished);
        assert_eq!(battle.result.as_ref().map(|r| r.winner), Some(Winner::Attacker));
    }

    #[test]
    fn notifications_are_forwarded_not_stored() {
        let (mut world, _, player_id) = setup();
        let mut reconciler = Reconciler::new();
        let before = world.clone();
        let note = Notification::new(
            player_id,
            NotificationType::AttackIncoming,
            "Attack",
            "Incoming",
            Utc::now(),
        );
        let outcome = reconciler
            .apply_canonical(&mut world, envelope(4, None, PushMessage::Notification(note)), Utc::now())
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Forwarded);
        assert_eq!(world, before);
        assert_eq!(reconciler.watermark(), 4);
    }

    #[test]
    fn replayed_notifications_are_not_forwarded_again() {
        let (mut world, _, player_id) = setup();
        let mut reconciler = Reconciler::new();
        let note = Notification::new(
            player_id,
            NotificationType::BattleResult,
            "Battle",
            "Won",
            Utc::now(),
        );
        let first = reconciler
            .apply_canonical(&mut world, envelope(6, None, PushMessage::Notification(note.clone())), Utc::now())
            .unwrap();
        assert_eq!(first, ReconcileOutcome::Forwarded);

        let replay = reconciler
            .apply_canonical(&mut world, envelope(6, None, PushMessage::Notification(note)), Utc::now())
            .unwrap();
        assert_eq!(
            replay,
            ReconcileOutcome::Stale {
                sequence: 6,
                last_seen: 6
            }
        );
        assert_eq!(reconciler.watermark(), 6);
    }
}
