//! Folding programs and upgrades into one modifier bundle per company.

use sim_core::{
    finite_or, CompanyId, CompanyProgram, CompanyUpgrade, EffectModifiers, GameWeek, NicheUpgrade,
    RandomSource,
};

/// Modifiers and recurring costs applying to one company this week.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompanyEffects {
    pub modifiers: EffectModifiers,
    pub extra_opex: f64,
}

impl Default for CompanyEffects {
    fn default() -> Self {
        Self {
            modifiers: EffectModifiers::identity(),
            extra_opex: 0.0,
        }
    }
}

/// Compose running programs and matured upgrades. Weekly costs of running
/// programs and of every owned upgrade count as extra opex; upgrade opex
/// starts in the purchase week even while the effect is still pending.
pub fn fold_effects<'a>(
    week: GameWeek,
    programs: impl IntoIterator<Item = &'a CompanyProgram>,
    upgrades: impl IntoIterator<Item = &'a CompanyUpgrade>,
) -> CompanyEffects {
    let mut modifiers = EffectModifiers::identity();
    let mut extra_opex = 0.0;
    for p in programs.into_iter().filter(|p| p.is_running_at(week)) {
        modifiers = modifiers.compose(&p.modifiers);
        extra_opex += finite_or(p.weekly_cost, 0.0).max(0.0);
    }
    for u in upgrades {
        extra_opex += finite_or(u.weekly_opex, 0.0).max(0.0);
        if u.is_mature_at(week) {
            modifiers = modifiers.compose(&u.effects);
        }
    }
    CompanyEffects {
        modifiers: modifiers.sanitized(),
        extra_opex,
    }
}

/// Purchase record for `upgrade`, with delay and effect sizes drawn from the
/// catalog ranges. Seeded by the purchase week so the draw never changes
/// afterwards.
pub fn draw_upgrade(
    upgrade: &NicheUpgrade,
    company: &CompanyId,
    capacity: f64,
    purchased: GameWeek,
    rng: &RandomSource,
) -> CompanyUpgrade {
    let mut stream = rng
        .at(purchased)
        .stream(&["upgrade", company.as_str(), upgrade.id.as_str()]);
    let (lo, hi) = upgrade.delay_weeks;
    let delay_weeks = stream.pick_int_range(i64::from(lo), i64::from(hi)).max(0) as u32;

    let mut effects = EffectModifiers::identity();
    for e in &upgrade.effects {
        let magnitude = stream.pick_range(e.min, e.max);
        effects = effects.compose(&EffectModifiers::single(e.target, magnitude));
    }
    for r in &upgrade.risks {
        if stream.chance(r.chance.clamp(0.0, 1.0)) {
            tracing::debug!(company = %company, upgrade = %upgrade.id, target = ?r.target, "upgrade risk fired");
            effects = effects.compose(&EffectModifiers::single(r.target, r.magnitude));
        }
    }

    CompanyUpgrade {
        company_id: company.clone(),
        upgrade_id: upgrade.id.clone(),
        purchased,
        capex_paid: upgrade.capex.eval(capacity),
        weekly_opex: upgrade.weekly_opex.eval(capacity),
        delay_weeks,
        effects: effects.sanitized(),
    }
}
