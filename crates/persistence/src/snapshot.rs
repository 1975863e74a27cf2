//! Whole-world documents used to seed and export stores.

use crate::error::StoreResult;
use serde::{Deserialize, Serialize};
use sim_core::{
    validate_catalog, validate_loan, Bot, Company, CompanyDecision, CompanyFinancials,
    CompanyProgram, CompanyState, CompanyUpgrade, GameEvent, Holding, HoldingDecision, Loan,
    Niche, NicheUpgrade, Player, Sector, ValidationError, World, WorldEconomyState, WorldRound,
    WorldSectorState,
};
use std::collections::BTreeSet;
use std::path::Path;

/// Complete persisted state of one world.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub world: World,
    pub economy: WorldEconomyState,
    #[serde(default)]
    pub sectors: Vec<Sector>,
    #[serde(default)]
    pub niches: Vec<Niche>,
    #[serde(default)]
    pub niche_upgrades: Vec<NicheUpgrade>,
    #[serde(default)]
    pub sector_states: Vec<WorldSectorState>,
    #[serde(default)]
    pub holdings: Vec<Holding>,
    #[serde(default)]
    pub bots: Vec<Bot>,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub company_states: Vec<CompanyState>,
    #[serde(default)]
    pub financials: Vec<CompanyFinancials>,
    #[serde(default)]
    pub loans: Vec<Loan>,
    #[serde(default)]
    pub programs: Vec<CompanyProgram>,
    #[serde(default)]
    pub company_upgrades: Vec<CompanyUpgrade>,
    #[serde(default)]
    pub company_decisions: Vec<CompanyDecision>,
    #[serde(default)]
    pub holding_decisions: Vec<HoldingDecision>,
    #[serde(default)]
    pub events: Vec<GameEvent>,
    #[serde(default)]
    pub rounds: Vec<WorldRound>,
}

impl WorldSnapshot {
    pub fn from_yaml_str(text: &str) -> StoreResult<Self> {
        let snapshot: WorldSnapshot = serde_yaml::from_str(text)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml(&self) -> StoreResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Catalog checks plus every cross-reference between entities.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_catalog(&self.sectors, &self.niches, &self.niche_upgrades)?;
        if self.economy.world_id != self.world.id {
            return Err(ValidationError::ReferenceNotFound(self.economy.world_id.to_string()));
        }
        let holdings: BTreeSet<_> = self.holdings.iter().map(|h| &h.id).collect();
        let niches: BTreeSet<_> = self.niches.iter().map(|n| (&n.sector_id, &n.id)).collect();
        let bots: BTreeSet<_> = self.bots.iter().map(|b| &b.id).collect();
        let players: BTreeSet<_> = self.players.iter().map(|p| &p.id).collect();
        let mut companies = BTreeSet::new();

        for h in &self.holdings {
            let owner_known = match (h.player_id(), h.bot_id()) {
                (Some(p), _) => players.contains(p),
                (_, Some(b)) => bots.contains(b),
                (None, None) => false,
            };
            if !owner_known {
                return Err(ValidationError::ReferenceNotFound(h.id.to_string()));
            }
        }
        for c in &self.companies {
            if !companies.insert(&c.id) {
                return Err(ValidationError::DuplicateId(c.id.to_string()));
            }
            if !holdings.contains(&c.holding_id) {
                return Err(ValidationError::ReferenceNotFound(c.holding_id.to_string()));
            }
            if !niches.contains(&(&c.sector_id, &c.niche_id)) {
                return Err(ValidationError::ReferenceNotFound(c.niche_id.to_string()));
            }
        }
        for s in &self.company_states {
            if !companies.contains(&s.company_id) {
                return Err(ValidationError::ReferenceNotFound(s.company_id.to_string()));
            }
        }
        for l in &self.loans {
            validate_loan(l)?;
        }
        Ok(())
    }
}
