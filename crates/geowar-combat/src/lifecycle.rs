//! Battle state machine: `preparing -> in_progress -> finished`.
//!
//! A finished battle is immutable; every further transition is rejected.

use chrono::{DateTime, Utc};

use geowar_types::{
    Army, Battle, BattleId, BattleResult, BattleSide, BattleStatus, Entity, ResourceBonus,
    TerritoryId,
};

use crate::CombatError;
use crate::resolver::{CombatResult, resolve};

/// Create a battle in `preparing` with copies of both armies.
pub fn declare(
    attacker_army: &Army,
    defender_army: &Army,
    defender: BattleSide,
    territory_id: TerritoryId,
    now: DateTime<Utc>,
) -> Battle {
    Battle {
        id: BattleId::new(),
        attacker_id: attacker_army.owner_id,
        defender_id: defender,
        territory_id,
        attacker_army: attacker_army.clone(),
        defender_army: defender_army.clone(),
        status: BattleStatus::Preparing,
        rounds: Vec::new(),
        result: None,
        created_at: now,
        updated_at: now,
    }
}

/// Status transitions on a [`Battle`].
pub trait BattleLifecycle {
    /// `preparing -> in_progress`.
    fn begin(&mut self, now: DateTime<Utc>) -> Result<(), CombatError>;

    /// Run the resolver on the stored snapshots. Only valid while in progress.
    fn fight(&self) -> Result<CombatResult, CombatError>;

    /// `in_progress -> finished`, writing the outcome with an empty reward.
    fn conclude(
        &mut self,
        outcome: &CombatResult,
        now: DateTime<Utc>,
    ) -> Result<&BattleResult, CombatError>;
}

impl BattleLifecycle for Battle {
    fn begin(&mut self, now: DateTime<Utc>) -> Result<(), CombatError> {
        expect_status(self, BattleStatus::Preparing, BattleStatus::InProgress)?;
        self.status = BattleStatus::InProgress;
        self.touch(now);
        Ok(())
    }

    fn fight(&self) -> Result<CombatResult, CombatError> {
        expect_status(self, BattleStatus::InProgress, BattleStatus::Finished)?;
        Ok(resolve(&self.attacker_army, &self.defender_army))
    }

    fn conclude(
        &mut self,
        outcome: &CombatResult,
        now: DateTime<Utc>,
    ) -> Result<&BattleResult, CombatError> {
        expect_status(self, BattleStatus::InProgress, BattleStatus::Finished)?;
        self.status = BattleStatus::Finished;
        self.touch(now);
        Ok(self.result.insert(BattleResult {
            winner: outcome.winner,
            territory_conquered: outcome.territory_conquered(),
            attacker_remaining_units: outcome.attacker_remaining_units.clone(),
            defender_remaining_units: outcome.defender_remaining_units.clone(),
            rewards: ResourceBonus::new(),
        }))
    }
}

fn expect_status(
    battle: &Battle,
    required: BattleStatus,
    to: BattleStatus,
) -> Result<(), CombatError> {
    if battle.status == required {
        Ok(())
    } else {
        Err(CombatError::InvalidTransition {
            battle_id: battle.id,
            from: battle.status,
            to,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use geowar_types::{
        ArmyId, ArmyStatus, PlayerId, Resources, Unit, UnitId, UnitType, Winner,
    };

    use super::*;

    fn army(quantity: u32, status: ArmyStatus) -> Army {
        let now = Utc::now();
        Army {
            id: ArmyId::new(),
            name: String::from("a"),
            owner_id: PlayerId::new(),
            units: vec![Unit {
                id: UnitId::new(),
                unit_type: UnitType::Infantry,
                quantity,
                health: 100,
                attack: 5,
                defense: 5,
                speed: 1,
                upkeep_cost: Resources::ZERO,
                created_at: now,
                updated_at: now,
            }],
            location: geowar_types::TerritoryId::new(),
            status,
            morale: 100,
            experience: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn full_lifecycle() {
        let attacker = army(100, ArmyStatus::Attacking);
        let defender = army(40, ArmyStatus::Idle);
        let now = Utc::now();
        let mut battle = declare(&attacker, &defender, BattleSide::Neutral, TerritoryId::new(), now);
        assert_eq!(battle.status, BattleStatus::Preparing);
        assert!(battle.rounds.is_empty());
        assert!(battle.fight().is_err());

        battle.begin(now).unwrap();
        let outcome = battle.fight().unwrap();
        let result = battle.conclude(&outcome, now).unwrap();
        assert_eq!(result.winner, Winner::Attacker);
        assert!(result.territory_conquered);
        assert!(result.rewards.is_empty());
        assert_eq!(battle.status, BattleStatus::Finished);
    }

    #[test]
    fn finished_battle_rejects_transitions() {
        let attacker = army(10, ArmyStatus::Attacking);
        let defender = army(10, ArmyStatus::Defending);
        let now = Utc::now();
        let mut battle = declare(&attacker, &defender, BattleSide::Neutral, TerritoryId::new(), now);
        battle.begin(now).unwrap();
        let outcome = battle.fight().unwrap();
        battle.conclude(&outcome, now).unwrap();
        let frozen = battle.clone();

        assert!(matches!(
            battle.begin(now),
            Err(CombatError::InvalidTransition { from: BattleStatus::Finished, .. })
        ));
        assert!(battle.conclude(&outcome, now).is_err());
        assert_eq!(battle, frozen);
    }

    #[test]
    fn snapshots_are_copies() {
        let mut attacker = army(10, ArmyStatus::Attacking);
        let defender = army(10, ArmyStatus::Idle);
        let battle = declare(&attacker, &defender, BattleSide::Neutral, TerritoryId::new(), Utc::now());
        attacker.units.clear();
        assert_eq!(battle.attacker_army.total_quantity(), 10);
    }
}
