//! Applying company decisions to the tick's working copy.
//!
//! Direct writes (price, marketing, staffing, capacity, quality) replace the
//! field on the company's state. Programs and upgrades change the working
//! sets and pay their one-off cost from the holding's cash immediately.
//! Stale or invalid input is skipped, never escalated.

use crate::effects::draw_upgrade;
use crate::error::TickError;
use sim_core::{
    finite_or, money, Company, CompanyDecisionPayload, CompanyId, CompanyProgram, CompanyState,
    CompanyUpgrade, GameWeek, Holding, HoldingId, Niche, NicheUpgrade, ProgramId, ProgramStatus,
    RandomSource, UpgradeId,
};
use std::collections::BTreeMap;

/// Result of applying one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Done,
    Skipped(&'static str),
}

/// Mutable state decisions write into during one tick.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    pub states: BTreeMap<CompanyId, CompanyState>,
    pub holdings: BTreeMap<HoldingId, Holding>,
    pub programs: BTreeMap<ProgramId, CompanyProgram>,
    pub upgrades: BTreeMap<(CompanyId, UpgradeId), CompanyUpgrade>,
    /// Upgrades bought this week, in purchase order.
    pub purchased: Vec<(CompanyId, UpgradeId)>,
}

impl WorkingSet {
    pub fn programs_of<'a>(&'a self, company: &'a CompanyId) -> impl Iterator<Item = &'a CompanyProgram> + 'a {
        self.programs.values().filter(move |p| &p.company_id == company)
    }

    pub fn upgrades_of<'a>(&'a self, company: &'a CompanyId) -> impl Iterator<Item = &'a CompanyUpgrade> + 'a {
        self.upgrades
            .range((company.clone(), UpgradeId::new(""))..)
            .take_while(move |((c, _), _)| c == company)
            .map(|(_, u)| u)
    }

    /// Debit `cost` from the company's holding when cash covers it.
    fn pay(&mut self, holding: &HoldingId, cost: f64) -> Result<bool, TickError> {
        let h = self
            .holdings
            .get_mut(holding)
            .ok_or_else(|| TickError::HoldingNotFound(holding.clone()))?;
        let cost = money(cost);
        if h.cash < cost {
            return Ok(false);
        }
        h.cash -= cost;
        Ok(true)
    }
}

/// Read-only context for one company's decisions.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub company: &'a Company,
    pub niche: &'a Niche,
    pub catalog: &'a BTreeMap<UpgradeId, NicheUpgrade>,
    pub week: GameWeek,
    pub rng: &'a RandomSource,
}

fn non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

/// Apply one decision. `tag` makes ids created by the decision unique and
/// reproducible.
pub fn apply_company_decision(
    ws: &mut WorkingSet,
    ctx: &DecisionContext<'_>,
    tag: &str,
    payload: &CompanyDecisionPayload,
) -> Result<Applied, TickError> {
    let company = &ctx.company.id;
    let state = ws
        .states
        .get_mut(company)
        .ok_or_else(|| TickError::CompanyNotFound(company.clone()))?;

    let applied = match payload {
        CompanyDecisionPayload::SetPrice { price_level } => {
            if price_level.is_finite() && *price_level > 0.0 {
                state.price_level = *price_level;
                Applied::Done
            } else {
                Applied::Skipped("price level must be positive")
            }
        }
        CompanyDecisionPayload::SetUnitPrice { unit_price } => match unit_price {
            Some(p) if !(p.is_finite() && *p > 0.0) => Applied::Skipped("unit price must be positive"),
            _ => {
                state.unit_price_override = *unit_price;
                Applied::Done
            }
        },
        CompanyDecisionPayload::SetMarketing { weekly_spend } => {
            if non_negative(*weekly_spend) {
                state.marketing_spend = *weekly_spend;
                Applied::Done
            } else {
                Applied::Skipped("negative marketing spend")
            }
        }
        CompanyDecisionPayload::SetStaffing { employees } => {
            state.employees = *employees;
            Applied::Done
        }
        CompanyDecisionPayload::SetCapacity { capacity } => {
            if non_negative(*capacity) {
                state.capacity = *capacity;
                Applied::Done
            } else {
                Applied::Skipped("negative capacity")
            }
        }
        CompanyDecisionPayload::SetQuality { quality } => {
            if non_negative(*quality) {
                state.quality = *quality;
                Applied::Done
            } else {
                Applied::Skipped("negative quality")
            }
        }
        CompanyDecisionPayload::StartProgram {
            code,
            duration_weeks,
            weekly_cost,
            upfront_cost,
            modifiers,
        } => {
            let id = ProgramId::new(format!("prg-{company}-{tag}"));
            if *duration_weeks == 0 {
                Applied::Skipped("program without duration")
            } else if !non_negative(*weekly_cost) || !non_negative(*upfront_cost) {
                Applied::Skipped("negative program cost")
            } else if ws.programs.contains_key(&id) {
                Applied::Skipped("program already started")
            } else if !ws.pay(&ctx.company.holding_id, *upfront_cost)? {
                Applied::Skipped("insufficient cash for program")
            } else {
                ws.programs.insert(
                    id.clone(),
                    CompanyProgram {
                        id,
                        company_id: company.clone(),
                        code: code.clone(),
                        start: ctx.week,
                        duration_weeks: *duration_weeks,
                        modifiers: modifiers.sanitized(),
                        weekly_cost: *weekly_cost,
                        status: ProgramStatus::Active,
                    },
                );
                Applied::Done
            }
        }
        CompanyDecisionPayload::CancelProgram { program_id } => match ws.programs.get_mut(program_id) {
            Some(p) if &p.company_id == company && p.status == ProgramStatus::Active => {
                p.status = ProgramStatus::Cancelled;
                Applied::Done
            }
            _ => Applied::Skipped("no active program to cancel"),
        },
        CompanyDecisionPayload::BuyUpgrade { upgrade_id } => {
            let capacity = finite_or(state.capacity, 0.0);
            let key = (company.clone(), upgrade_id.clone());
            match ctx.catalog.get(upgrade_id) {
                None => Applied::Skipped("unknown upgrade"),
                Some(u) if u.niche_id != ctx.niche.id => Applied::Skipped("upgrade belongs to another niche"),
                Some(_) if ws.upgrades.contains_key(&key) => Applied::Skipped("upgrade already owned"),
                Some(u) => {
                    let record = draw_upgrade(u, company, capacity, ctx.week, ctx.rng);
                    if ws.pay(&ctx.company.holding_id, record.capex_paid)? {
                        tracing::debug!(
                            company = %company,
                            upgrade = %upgrade_id,
                            delay = record.delay_weeks,
                            "upgrade purchased"
                        );
                        ws.upgrades.insert(key.clone(), record);
                        ws.purchased.push(key);
                        Applied::Done
                    } else {
                        Applied::Skipped("insufficient cash for upgrade")
                    }
                }
            }
        }
    };

    if let Applied::Skipped(reason) = applied {
        tracing::debug!(company = %company, kind = payload.kind(), reason, "decision skipped");
    }
    Ok(applied)
}
