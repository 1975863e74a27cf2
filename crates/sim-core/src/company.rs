//! Holdings, bots, companies and their weekly state/financial rows.

use crate::catalog::Niche;
use crate::ids::{BotId, CompanyId, HoldingId, NicheId, PlayerId, SectorId, WorldId};
use crate::time::GameWeek;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Who controls a holding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldingOwner {
    Player(PlayerId),
    Bot(BotId),
}

/// Financial parent of a group of companies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub id: HoldingId,
    pub world_id: WorldId,
    pub name: String,
    pub owner: HoldingOwner,
    pub cash: Decimal,
    #[serde(default)]
    pub total_equity: Decimal,
    #[serde(default)]
    pub total_debt: Decimal,
    #[serde(default)]
    pub prestige_level: u32,
}

impl Holding {
    pub fn player_id(&self) -> Option<&PlayerId> {
        match &self.owner {
            HoldingOwner::Player(p) => Some(p),
            HoldingOwner::Bot(_) => None,
        }
    }

    pub fn bot_id(&self) -> Option<&BotId> {
        match &self.owner {
            HoldingOwner::Bot(b) => Some(b),
            HoldingOwner::Player(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BotArchetype {
    /// Undercuts on price.
    Discounter,
    /// Prices high and spends on marketing.
    Premium,
    Balanced,
    /// Adds capacity whenever the books allow.
    Expansionist,
}

/// Behaviour profile of a bot-controlled holding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bot {
    pub id: BotId,
    pub world_id: WorldId,
    pub archetype: BotArchetype,
    /// 0..=1.
    pub aggressiveness: f64,
    /// 0..=1.
    pub risk_tolerance: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompanyStatus {
    Active,
    Liquidating,
    Bankrupt,
    Sold,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub world_id: WorldId,
    pub holding_id: HoldingId,
    pub sector_id: SectorId,
    pub niche_id: NicheId,
    pub name: String,
    pub status: CompanyStatus,
}

/// Operational state of a company for one week.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyState {
    pub company_id: CompanyId,
    pub week: GameWeek,
    /// Multiplier on the niche base price.
    pub price_level: f64,
    /// Absolute unit price replacing `base_price * price_level` when set.
    #[serde(default)]
    pub unit_price_override: Option<f64>,
    /// Units per week.
    pub capacity: f64,
    pub quality: f64,
    /// Weekly marketing budget.
    pub marketing_spend: f64,
    /// Brand awareness, 0..=1.
    pub awareness: f64,
    pub employees: u32,
    /// Weekly fixed cost before modifiers.
    pub fixed_cost_base: f64,
    /// Variable cost per unit before modifiers.
    pub variable_cost_base: f64,
    /// 0..=1.
    pub reputation: f64,
    /// Rolling operational efficiency score, 0..=1.
    pub operational_efficiency: f64,
    /// Sold volume over effective capacity in the last simulated week.
    pub utilisation: f64,
}

impl CompanyState {
    /// Starting state for a company that has never been simulated.
    pub fn initial(company_id: CompanyId, niche: &Niche, week: GameWeek) -> Self {
        Self {
            company_id,
            week,
            price_level: 1.0,
            unit_price_override: None,
            capacity: niche.initial_capacity,
            quality: 1.0,
            marketing_spend: 0.0,
            awareness: 0.1,
            employees: 5,
            fixed_cost_base: niche.fixed_cost_weekly,
            variable_cost_base: niche.unit_cost,
            reputation: 0.5,
            operational_efficiency: 0.5,
            utilisation: 0.0,
        }
    }
}

/// Profit and loss of a company for one week.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyFinancials {
    pub company_id: CompanyId,
    pub week: GameWeek,
    pub sold_volume: f64,
    pub market_share: f64,
    /// Gross sales minus refunds.
    pub revenue: Decimal,
    pub refunds: Decimal,
    pub cogs: Decimal,
    pub opex: Decimal,
    pub interest_expense: Decimal,
    pub profit_before_tax: Decimal,
    pub tax_expense: Decimal,
    pub net_profit: Decimal,
    pub cash_change: Decimal,
}

impl CompanyFinancials {
    /// A zeroed row, used for companies that did not trade this week.
    pub fn empty(company_id: CompanyId, week: GameWeek) -> Self {
        Self {
            company_id,
            week,
            sold_volume: 0.0,
            market_share: 0.0,
            revenue: Decimal::ZERO,
            refunds: Decimal::ZERO,
            cogs: Decimal::ZERO,
            opex: Decimal::ZERO,
            interest_expense: Decimal::ZERO,
            profit_before_tax: Decimal::ZERO,
            tax_expense: Decimal::ZERO,
            net_profit: Decimal::ZERO,
            cash_change: Decimal::ZERO,
        }
    }
}
