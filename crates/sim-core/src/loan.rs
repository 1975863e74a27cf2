//! Loans owned by a holding or a single company.

use crate::ids::{CompanyId, HoldingId, LoanId, WorldId};
use crate::time::GameWeek;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanOwner {
    Holding(HoldingId),
    Company(CompanyId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Active,
    PaidOff,
    Defaulted,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub world_id: WorldId,
    pub owner: LoanOwner,
    pub principal: Decimal,
    pub outstanding: Decimal,
    /// Annual rate, e.g. 0.12.
    pub annual_rate: Decimal,
    pub term_weeks: u32,
    pub remaining_weeks: u32,
    /// Origination week; interest accrues from the following week.
    pub start: GameWeek,
    pub status: LoanStatus,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }

    pub fn is_holding_loan(&self, holding: &HoldingId) -> bool {
        matches!(&self.owner, LoanOwner::Holding(h) if h == holding)
    }
}
