//! Checked arithmetic on resource balances.
//!
//! Every operation either applies in full or leaves the balance untouched.
//! Cost vectors are sparse; entries that are zero or negative never block a
//! purchase and are never charged.

use rust_decimal::Decimal;

use geowar_types::{ResourceBonus, ResourceKind, Resources};

use crate::LedgerError;

/// Add `delta` to `balance`.
///
/// Negative components are allowed (upkeep, event penalties).
pub fn credit(balance: &mut Resources, delta: &Resources) -> Result<(), LedgerError> {
    let mut next = *balance;
    for (kind, amount) in delta.iter() {
        let slot = next.get_mut(kind);
        *slot = slot
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { resource: kind })?;
    }
    *balance = next;
    Ok(())
}

/// Add `delta` to a territory stockpile, holding each resource at or below
/// `capacity`.
///
/// A stock already above its capacity is never reduced by the cap, and the
/// result never drops below zero. Returns what actually went into storage.
pub fn stockpile(
    stock: &mut Resources,
    delta: &Resources,
    capacity: &Resources,
) -> Result<Resources, LedgerError> {
    let mut next = *stock;
    let mut stored = Resources::ZERO;
    for (kind, amount) in delta.iter() {
        let held = stock.get(kind);
        let ceiling = capacity.get(kind).max(held);
        let target = held
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { resource: kind })?
            .min(ceiling)
            .max(Decimal::ZERO);
        *next.get_mut(kind) = target;
        *stored.get_mut(kind) = target
            .checked_sub(held)
            .ok_or(LedgerError::Overflow { resource: kind })?;
    }
    *stock = next;
    Ok(stored)
}

/// Whether `balance` covers every positive entry of `cost`.
pub fn can_afford(balance: &Resources, cost: &ResourceBonus) -> bool {
    first_shortfall(balance, cost).is_none()
}

/// Subtract every positive entry of `cost` from `balance`.
///
/// Fails with [`LedgerError::Insufficient`] naming the first resource that
/// runs short, in which case nothing is deducted.
pub fn deduct(balance: &mut Resources, cost: &ResourceBonus) -> Result<(), LedgerError> {
    if let Some(err) = first_shortfall(balance, cost) {
        return Err(err);
    }
    let mut next = *balance;
    for (kind, amount) in charged(cost) {
        let slot = next.get_mut(kind);
        *slot = slot
            .checked_sub(amount)
            .ok_or(LedgerError::Overflow { resource: kind })?;
    }
    *balance = next;
    tracing::debug!(?cost, "resources deducted");
    Ok(())
}

/// Resources whose balance is at or below zero.
pub fn shortages(balance: &Resources) -> Vec<ResourceKind> {
    balance
        .iter()
        .filter(|(_, amount)| *amount <= Decimal::ZERO)
        .map(|(kind, _)| kind)
        .collect()
}

fn charged(cost: &ResourceBonus) -> impl Iterator<Item = (ResourceKind, Decimal)> + '_ {
    cost.iter().filter(|(_, amount)| *amount > Decimal::ZERO)
}

fn first_shortfall(balance: &Resources, cost: &ResourceBonus) -> Option<LedgerError> {
    charged(cost).find_map(|(kind, required)| {
        let available = balance.get(kind);
        (available < required).then_some(LedgerError::Insufficient {
            resource: kind,
            required,
            available,
        })
    })
}
