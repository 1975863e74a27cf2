//! Player and bot decisions.
//!
//! Payloads are closed enums tagged by `type` on the wire. Consumers match on
//! them without a wildcard arm, so adding a kind forces every dispatcher to
//! handle it.

use crate::ids::{CompanyId, DecisionId, HoldingId, LoanId, ProgramId, UpgradeId, WorldId};
use crate::modifiers::EffectModifiers;
use crate::time::GameWeek;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompanyDecisionPayload {
    SetPrice {
        price_level: f64,
    },
    /// `None` clears an override and returns to level-based pricing.
    SetUnitPrice {
        unit_price: Option<f64>,
    },
    SetMarketing {
        weekly_spend: f64,
    },
    SetStaffing {
        employees: u32,
    },
    SetCapacity {
        capacity: f64,
    },
    SetQuality {
        quality: f64,
    },
    StartProgram {
        code: String,
        duration_weeks: u32,
        #[serde(default)]
        weekly_cost: f64,
        #[serde(default)]
        upfront_cost: f64,
        #[serde(default)]
        modifiers: EffectModifiers,
    },
    CancelProgram {
        program_id: ProgramId,
    },
    BuyUpgrade {
        upgrade_id: UpgradeId,
    },
}

impl CompanyDecisionPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            CompanyDecisionPayload::SetPrice { .. } => "SET_PRICE",
            CompanyDecisionPayload::SetUnitPrice { .. } => "SET_UNIT_PRICE",
            CompanyDecisionPayload::SetMarketing { .. } => "SET_MARKETING",
            CompanyDecisionPayload::SetStaffing { .. } => "SET_STAFFING",
            CompanyDecisionPayload::SetCapacity { .. } => "SET_CAPACITY",
            CompanyDecisionPayload::SetQuality { .. } => "SET_QUALITY",
            CompanyDecisionPayload::StartProgram { .. } => "START_PROGRAM",
            CompanyDecisionPayload::CancelProgram { .. } => "CANCEL_PROGRAM",
            CompanyDecisionPayload::BuyUpgrade { .. } => "BUY_UPGRADE",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldingDecisionPayload {
    TakeHoldingLoan {
        amount: Decimal,
        term_weeks: u32,
    },
    RepayHoldingLoan {
        loan_id: LoanId,
        amount: Decimal,
    },
    BuyCompany {
        company_id: CompanyId,
        price: Decimal,
    },
}

impl HoldingDecisionPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            HoldingDecisionPayload::TakeHoldingLoan { .. } => "TAKE_HOLDING_LOAN",
            HoldingDecisionPayload::RepayHoldingLoan { .. } => "REPAY_HOLDING_LOAN",
            HoldingDecisionPayload::BuyCompany { .. } => "BUY_COMPANY",
        }
    }
}

/// Append-only decision row for one company and round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyDecision {
    pub id: DecisionId,
    /// Store-assigned submission sequence; orders decisions and gates late ones.
    pub seq: u64,
    pub world_id: WorldId,
    pub company_id: CompanyId,
    pub week: GameWeek,
    pub created_at: DateTime<Utc>,
    pub payload: CompanyDecisionPayload,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoldingDecision {
    pub id: DecisionId,
    pub seq: u64,
    pub world_id: WorldId,
    pub holding_id: HoldingId,
    pub week: GameWeek,
    pub created_at: DateTime<Utc>,
    pub payload: HoldingDecisionPayload,
}
