//! Weekly adjustments for bot-owned companies that received no decisions.

use crate::utility;
use rust_decimal::prelude::ToPrimitive;
use sim_core::{
    finite_or, Bot, BotArchetype, CompanyDecisionPayload, CompanyFinancials, CompanyState,
    RandomSource,
};

struct Profile {
    target_price: f64,
    base_marketing: f64,
    growth: f64,
}

fn profile(archetype: BotArchetype) -> Profile {
    match archetype {
        BotArchetype::Discounter => Profile {
            target_price: 0.85,
            base_marketing: 200.0,
            growth: 0.06,
        },
        BotArchetype::Premium => Profile {
            target_price: 1.25,
            base_marketing: 600.0,
            growth: 0.04,
        },
        BotArchetype::Balanced => Profile {
            target_price: 1.0,
            base_marketing: 400.0,
            growth: 0.05,
        },
        BotArchetype::Expansionist => Profile {
            target_price: 0.95,
            base_marketing: 500.0,
            growth: 0.12,
        },
    }
}

/// Net margin of last week's books, in [-1, 1]. Zero without sales.
fn margin(f: &CompanyFinancials) -> f64 {
    let revenue = f.revenue.to_f64().unwrap_or(0.0);
    let profit = f.net_profit.to_f64().unwrap_or(0.0);
    if revenue > 0.0 {
        (profit / revenue).clamp(-1.0, 1.0)
    } else if profit < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Decisions for one bot company. Deterministic for a given
/// `(world, week, company)`.
pub fn plan_bot_decisions(
    bot: &Bot,
    state: &CompanyState,
    last: Option<&CompanyFinancials>,
    rng: &RandomSource,
) -> Vec<CompanyDecisionPayload> {
    let p = profile(bot.archetype);
    let aggressiveness = finite_or(bot.aggressiveness, 0.5).clamp(0.0, 1.0);
    let risk = finite_or(bot.risk_tolerance, 0.5).clamp(0.0, 1.0);
    let mut stream = rng.stream(&["bot-plan", state.company_id.as_str()]);

    let (share, margin) = last.map(|f| (f.market_share, margin(f))).unwrap_or((0.0, 0.0));
    let score = utility(share, margin);
    let mut out = Vec::new();

    let price = finite_or(state.price_level, 1.0);
    let mut next_price =
        price + (p.target_price - price) * 0.25 * (0.5 + aggressiveness) + stream.jitter() * 0.02 * risk;
    if margin < 0.0 && bot.archetype != BotArchetype::Discounter {
        next_price += 0.03;
    } else if score < 0.1 && bot.archetype == BotArchetype::Discounter {
        next_price -= 0.03 * aggressiveness;
    }
    let next_price = next_price.clamp(0.5, 2.0);
    if (next_price - price).abs() > 0.005 {
        out.push(CompanyDecisionPayload::SetPrice {
            price_level: next_price,
        });
    }

    let spend = finite_or(state.marketing_spend, 0.0);
    let mut target_spend = p.base_marketing * (0.5 + aggressiveness);
    if margin < 0.0 {
        target_spend *= 1.0 - 0.3 * (1.0 - risk);
    }
    let next_spend = (spend + (target_spend - spend) * 0.5).max(0.0);
    if (next_spend - spend).abs() > 1.0 {
        out.push(CompanyDecisionPayload::SetMarketing {
            weekly_spend: next_spend,
        });
    }

    let capacity = finite_or(state.capacity, 0.0).max(0.0);
    let grow = state.utilisation > 0.9 && margin > 0.0 && stream.chance(0.5 + risk * 0.5);
    let shrink = state.utilisation < 0.4 && margin < 0.0;
    if grow {
        out.push(CompanyDecisionPayload::SetCapacity {
            capacity: capacity * (1.0 + p.growth * (0.5 + risk)),
        });
    } else if shrink && capacity > 0.0 {
        out.push(CompanyDecisionPayload::SetCapacity {
            capacity: capacity * 0.9,
        });
    }

    tracing::trace!(company = %state.company_id, score, decisions = out.len(), "bot plan");
    out
}
