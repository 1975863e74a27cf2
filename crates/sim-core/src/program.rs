//! Time-boxed programs and purchased upgrades.

use crate::ids::{CompanyId, ProgramId, UpgradeId};
use crate::modifiers::EffectModifiers;
use crate::time::GameWeek;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgramStatus {
    Active,
    Cancelled,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyProgram {
    pub id: ProgramId,
    pub company_id: CompanyId,
    pub code: String,
    pub start: GameWeek,
    pub duration_weeks: u32,
    pub modifiers: EffectModifiers,
    #[serde(default)]
    pub weekly_cost: f64,
    pub status: ProgramStatus,
}

impl CompanyProgram {
    /// Whether the program's effects apply in `week`.
    pub fn is_running_at(&self, week: GameWeek) -> bool {
        self.status == ProgramStatus::Active
            && week.index() >= self.start.index()
            && week.index() < self.start.index() + i64::from(self.duration_weeks)
    }

    /// Whether `week` is the last week of the program's window.
    pub fn ends_at(&self, week: GameWeek) -> bool {
        self.start.index() + i64::from(self.duration_weeks.max(1)) - 1 <= week.index()
    }
}

/// Purchase record of a niche upgrade; one per (company, upgrade).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyUpgrade {
    pub company_id: CompanyId,
    pub upgrade_id: UpgradeId,
    pub purchased: GameWeek,
    pub capex_paid: f64,
    pub weekly_opex: f64,
    /// Drawn at purchase from the catalog range.
    pub delay_weeks: u32,
    /// Effects drawn at purchase, including any risks that fired.
    pub effects: EffectModifiers,
}

impl CompanyUpgrade {
    pub fn is_mature_at(&self, week: GameWeek) -> bool {
        week.index() >= self.purchased.index() + i64::from(self.delay_weeks)
    }
}
