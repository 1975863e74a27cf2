use persistence::StoreError;
use sim_core::{CompanyId, HoldingId, LoanId, NicheId, ValidationError};
use thiserror::Error;

/// Conditions that abort a tick. The round stays failed and the lock is
/// released so the next poll retries.
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("company {0} not found")]
    CompanyNotFound(CompanyId),
    #[error("holding {0} not found")]
    HoldingNotFound(HoldingId),
    #[error("niche {0} not found")]
    NicheNotFound(NicheId),
    #[error("loan {0} not found")]
    LoanNotFound(LoanId),
    #[error("invalid engine config: {0}")]
    InvalidConfig(#[from] ValidationError),
}
