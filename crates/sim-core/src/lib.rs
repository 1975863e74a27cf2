#![deny(warnings)]

//! Core domain models and invariants for the weekly holdings economy.
//!
//! This crate defines the serializable types shared by the engines, the
//! persistence layer and the tick runtime, together with the deterministic
//! [`RandomSource`], the [`EffectModifiers`] algebra, the engine
//! configuration and validation helpers.

pub mod catalog;
pub mod company;
pub mod config;
pub mod decision;
pub mod event;
pub mod ids;
pub mod loan;
pub mod modifiers;
pub mod pressure;
pub mod program;
pub mod rng;
pub mod time;
pub mod world;

pub use catalog::*;
pub use company::*;
pub use config::*;
pub use decision::*;
pub use event::*;
pub use ids::*;
pub use loan::*;
pub use modifiers::*;
pub use pressure::BotPressure;
pub use program::*;
pub use rng::{Mulberry32, RandomSource};
pub use time::*;
pub use world::*;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use thiserror::Error;

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Numeric field must be finite.
    #[error("non-finite numeric value encountered")]
    NonFinite,
    /// Price or cost must be non-negative.
    #[error("negative monetary value is invalid")]
    NegativeMoney,
    /// Elasticity must be strictly negative.
    #[error("price elasticity must be < 0")]
    ElasticityNonNegative,
    #[error("{0} must be > 0")]
    NonPositive(&'static str),
    #[error("{0} is out of range")]
    OutOfRange(&'static str),
    #[error("{0} lower bound exceeds upper bound")]
    InvertedBounds(&'static str),
    #[error("refund brackets must be ordered, non-overlapping, with rates in [0,1]")]
    InvalidRefundBrackets,
    /// Duplicate identifier in a catalog list.
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    /// Cross-reference to an entity that does not exist.
    #[error("reference not found: {0}")]
    ReferenceNotFound(String),
}

/// Convert a simulation amount to ledger money rounded to cents. Non-finite
/// values become zero.
pub fn money(amount: f64) -> Decimal {
    Decimal::from_f64(amount)
        .map(|d| d.round_dp(2))
        .unwrap_or(Decimal::ZERO)
}

/// Ledger money back to a simulation float.
pub fn money_f64(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or(0.0)
}

/// `value` when finite, otherwise `fallback`.
pub fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Validate a niche's numeric configuration.
pub fn validate_niche(n: &Niche) -> Result<(), ValidationError> {
    let nums = [
        n.base_demand,
        n.base_price,
        n.unit_cost,
        n.fixed_cost_weekly,
        n.base_wage,
        n.volatility,
        n.initial_capacity,
    ];
    if nums.iter().any(|v| !v.is_finite()) || n.seasonality.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::NonFinite);
    }
    if n.base_price < 0.0 || n.unit_cost < 0.0 || n.fixed_cost_weekly < 0.0 || n.base_wage < 0.0 {
        return Err(ValidationError::NegativeMoney);
    }
    if n.base_demand < 0.0 {
        return Err(ValidationError::OutOfRange("niche.base_demand"));
    }
    if !n.price_elasticity.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    if n.price_elasticity >= 0.0 {
        return Err(ValidationError::ElasticityNonNegative);
    }
    let share: f64 = n.segments.iter().map(|s| s.demand_share).sum();
    if !n.segments.is_empty() && !(share > 0.0 && share <= 1.0 + 1e-9) {
        return Err(ValidationError::OutOfRange("niche.segments.demand_share"));
    }
    for s in &n.segments {
        if s.price_elasticity >= 0.0 {
            return Err(ValidationError::ElasticityNonNegative);
        }
        if s.reference_price_level <= 0.0 {
            return Err(ValidationError::NonPositive("segment.reference_price_level"));
        }
    }
    Ok(())
}

/// Validate a loan's amounts and term.
pub fn validate_loan(l: &Loan) -> Result<(), ValidationError> {
    if l.principal < Decimal::ZERO || l.outstanding < Decimal::ZERO || l.annual_rate < Decimal::ZERO
    {
        return Err(ValidationError::NegativeMoney);
    }
    if l.is_active() && l.term_weeks == 0 {
        return Err(ValidationError::NonPositive("loan.term_weeks"));
    }
    if l.remaining_weeks > l.term_weeks {
        return Err(ValidationError::OutOfRange("loan.remaining_weeks"));
    }
    Ok(())
}

/// Validate the static catalog, including cross-references.
pub fn validate_catalog(
    sectors: &[Sector],
    niches: &[Niche],
    upgrades: &[NicheUpgrade],
) -> Result<(), ValidationError> {
    let mut sector_ids = BTreeSet::new();
    for s in sectors {
        if !sector_ids.insert(&s.id) {
            return Err(ValidationError::DuplicateId(s.id.0.clone()));
        }
    }
    let mut niche_ids = BTreeSet::new();
    for n in niches {
        validate_niche(n)?;
        if !niche_ids.insert(&n.id) {
            return Err(ValidationError::DuplicateId(n.id.0.clone()));
        }
        if !sector_ids.contains(&n.sector_id) {
            return Err(ValidationError::ReferenceNotFound(n.sector_id.0.clone()));
        }
    }
    for u in upgrades {
        if !niche_ids.contains(&u.niche_id) {
            return Err(ValidationError::ReferenceNotFound(u.niche_id.0.clone()));
        }
        if u.delay_weeks.0 > u.delay_weeks.1 {
            return Err(ValidationError::InvertedBounds("upgrade.delay_weeks"));
        }
        if u.effects.iter().any(|e| e.min > e.max) {
            return Err(ValidationError::InvertedBounds("upgrade.effects"));
        }
    }
    Ok(())
}
