//! Loan amortization, corporate tax and holding-level aggregation.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sim_core::{
    CompanyFinancials, FinanceConfig, GameWeek, Holding, Loan, LoanOwner, LoanStatus,
};

const WEEKS_PER_YEAR: u32 = 52;

/// Holding, its companies' raw financials and every loan of either.
#[derive(Debug, Clone)]
pub struct FinanceInput<'a> {
    pub week: GameWeek,
    pub holding: &'a Holding,
    pub financials: Vec<CompanyFinancials>,
    pub loans: Vec<Loan>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinanceOutcome {
    pub holding: Holding,
    pub financials: Vec<CompanyFinancials>,
    pub loans: Vec<Loan>,
    pub holding_interest: Decimal,
}

/// One week of a loan's schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Amortization {
    pub loan: Loan,
    pub interest: Decimal,
    pub principal: Decimal,
}

/// Advance one loan by a week. Inactive loans and loans originated this
/// week are returned unchanged with zero interest.
pub fn amortize(loan: &Loan, week: GameWeek) -> Amortization {
    let unchanged = || Amortization {
        loan: loan.clone(),
        interest: Decimal::ZERO,
        principal: Decimal::ZERO,
    };
    if !loan.is_active() || loan.start.index() >= week.index() {
        return unchanged();
    }
    let outstanding = loan.outstanding.max(Decimal::ZERO);
    if loan.remaining_weeks == 0 || outstanding < Decimal::new(1, 2) {
        return Amortization {
            loan: Loan {
                outstanding: Decimal::ZERO,
                remaining_weeks: 0,
                status: LoanStatus::PaidOff,
                ..loan.clone()
            },
            interest: Decimal::ZERO,
            principal: outstanding,
        };
    }

    let interest = (outstanding * loan.annual_rate / Decimal::from(WEEKS_PER_YEAR)).round_dp(2);
    let scheduled = (outstanding / Decimal::from(loan.remaining_weeks)).round_dp(2);
    let principal = scheduled.max(interest).min(outstanding + interest);
    let mut next = (outstanding + interest - principal).max(Decimal::ZERO);
    let remaining_weeks = loan.remaining_weeks - 1;

    let (status, principal) = if remaining_weeks == 0 || next < Decimal::new(1, 2) {
        let settled = principal + next;
        next = Decimal::ZERO;
        (LoanStatus::PaidOff, settled)
    } else {
        (LoanStatus::Active, principal)
    };

    Amortization {
        loan: Loan {
            outstanding: next,
            remaining_weeks,
            status,
            ..loan.clone()
        },
        interest,
        principal,
    }
}

/// Settle one holding for the week.
pub fn settle_holding(input: &FinanceInput<'_>, cfg: &FinanceConfig) -> FinanceOutcome {
    let tax_rate = Decimal::from_f64(cfg.corporate_tax_rate.clamp(0.0, 1.0)).unwrap_or(Decimal::ZERO);
    let mut financials = input.financials.clone();
    let mut loans = Vec::with_capacity(input.loans.len());
    let mut holding_interest = Decimal::ZERO;

    for loan in &input.loans {
        let step = amortize(loan, input.week);
        match &loan.owner {
            LoanOwner::Holding(id) if *id == input.holding.id => holding_interest += step.interest,
            LoanOwner::Holding(_) => {}
            LoanOwner::Company(id) => {
                if let Some(f) = financials.iter_mut().find(|f| &f.company_id == id) {
                    f.interest_expense += step.interest;
                    f.profit_before_tax -= step.interest;
                }
            }
        }
        if step.loan.status != loan.status {
            tracing::debug!(loan = %loan.id, status = ?step.loan.status, "loan status changed");
        }
        loans.push(step.loan);
    }

    for f in &mut financials {
        f.tax_expense = (f.profit_before_tax.max(Decimal::ZERO) * tax_rate).round_dp(2);
        f.net_profit = f.profit_before_tax - f.tax_expense;
        f.cash_change = f.net_profit;
    }

    let cash_change: Decimal = financials.iter().map(|f| f.cash_change).sum();
    let total_debt: Decimal = loans
        .iter()
        .filter(|l| l.is_active())
        .map(|l| l.outstanding)
        .sum();
    let cash = input.holding.cash + cash_change - holding_interest;
    let holding = Holding {
        cash,
        total_debt,
        total_equity: cash - total_debt,
        ..input.holding.clone()
    };

    FinanceOutcome {
        holding,
        financials,
        loans,
        holding_interest,
    }
}
