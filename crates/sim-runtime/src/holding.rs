//! Holding-level decisions: borrowing, repayment and company purchases.
//! Each is a direct cash transfer guarded by the holding's balance.

use crate::dispatch::Applied;
use crate::error::TickError;
use rust_decimal::Decimal;
use sim_core::{
    Company, CompanyId, CompanyStatus, GameWeek, Holding, HoldingDecision, HoldingDecisionPayload,
    HoldingId, Loan, LoanId, LoanOwner, LoanStatus,
};
use std::collections::BTreeMap;

/// Holdings, companies and loans as the holding step sees them.
#[derive(Debug, Clone, Default)]
pub struct HoldingBook {
    pub holdings: BTreeMap<HoldingId, Holding>,
    pub companies: BTreeMap<CompanyId, Company>,
    pub loans: BTreeMap<LoanId, Loan>,
}

pub fn apply_holding_decision(
    book: &mut HoldingBook,
    decision: &HoldingDecision,
    week: GameWeek,
    annual_rate: Decimal,
) -> Result<Applied, TickError> {
    let holding_id = &decision.holding_id;
    if !book.holdings.contains_key(holding_id) {
        return Err(TickError::HoldingNotFound(holding_id.clone()));
    }

    let applied = match &decision.payload {
        HoldingDecisionPayload::TakeHoldingLoan { amount, term_weeks } => {
            if *amount <= Decimal::ZERO || *term_weeks == 0 {
                Applied::Skipped("loan needs a positive amount and term")
            } else {
                let id = LoanId::new(format!("loan-{holding_id}-{}", decision.seq));
                if book.loans.contains_key(&id) {
                    Applied::Skipped("loan already taken")
                } else {
                    book.loans.insert(
                        id.clone(),
                        Loan {
                            id,
                            world_id: decision.world_id.clone(),
                            owner: LoanOwner::Holding(holding_id.clone()),
                            principal: *amount,
                            outstanding: *amount,
                            annual_rate,
                            term_weeks: *term_weeks,
                            remaining_weeks: *term_weeks,
                            start: week,
                            status: LoanStatus::Active,
                        },
                    );
                    if let Some(h) = book.holdings.get_mut(holding_id) {
                        h.cash += *amount;
                    }
                    Applied::Done
                }
            }
        }
        HoldingDecisionPayload::RepayHoldingLoan { loan_id, amount } => {
            let loan = book
                .loans
                .get_mut(loan_id)
                .ok_or_else(|| TickError::LoanNotFound(loan_id.clone()))?;
            let holding = book
                .holdings
                .get_mut(holding_id)
                .ok_or_else(|| TickError::HoldingNotFound(holding_id.clone()))?;
            let pay = (*amount).min(loan.outstanding);
            if !loan.is_holding_loan(holding_id) {
                Applied::Skipped("loan belongs to someone else")
            } else if !loan.is_active() {
                Applied::Skipped("loan is not active")
            } else if pay <= Decimal::ZERO {
                Applied::Skipped("nothing to repay")
            } else if holding.cash < pay {
                Applied::Skipped("insufficient cash for repayment")
            } else {
                holding.cash -= pay;
                loan.outstanding -= pay;
                if loan.outstanding < Decimal::new(1, 2) {
                    loan.outstanding = Decimal::ZERO;
                    loan.remaining_weeks = 0;
                    loan.status = LoanStatus::PaidOff;
                }
                Applied::Done
            }
        }
        HoldingDecisionPayload::BuyCompany { company_id, price } => {
            let company = book
                .companies
                .get(company_id)
                .ok_or_else(|| TickError::CompanyNotFound(company_id.clone()))?;
            let seller = company.holding_id.clone();
            let buyer_cash = book.holdings.get(holding_id).map(|h| h.cash).unwrap_or_default();
            if &seller == holding_id {
                Applied::Skipped("company already owned")
            } else if company.status != CompanyStatus::Active {
                Applied::Skipped("company is not trading")
            } else if *price < Decimal::ZERO {
                Applied::Skipped("negative price")
            } else if buyer_cash < *price {
                Applied::Skipped("insufficient cash for purchase")
            } else {
                if let Some(h) = book.holdings.get_mut(holding_id) {
                    h.cash -= *price;
                }
                match book.holdings.get_mut(&seller) {
                    Some(h) => h.cash += *price,
                    None => return Err(TickError::HoldingNotFound(seller)),
                }
                if let Some(c) = book.companies.get_mut(company_id) {
                    c.holding_id = holding_id.clone();
                }
                tracing::info!(company = %company_id, from = %seller, to = %holding_id, %price, "company sold");
                Applied::Done
            }
        }
    };

    if let Applied::Skipped(reason) = applied {
        tracing::debug!(holding = %holding_id, kind = decision.payload.kind(), reason, "decision skipped");
    }
    Ok(applied)
}
