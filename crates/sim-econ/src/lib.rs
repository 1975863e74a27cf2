#![deny(warnings)]

//! Pure weekly engines for the holdings economy.
//!
//! Every function here is synchronous and side-effect free: it takes
//! borrowed inputs plus a [`sim_core::RandomSource`] where noise is needed and
//! returns owned next-state values. Non-finite inputs fall back to documented
//! defaults instead of failing.
//!
//! - [`macro_engine`]: interest, inflation, wage index
//! - [`sector`]: smoothed sector demand
//! - [`market`]: softmax market shares
//! - [`company`] and [`segment`]: allocation, costs and company state
//! - [`finance`]: loans, tax, holding totals
//! - [`progression`]: player brand and credit tracks

pub mod company;
pub mod finance;
pub mod macro_engine;
pub mod market;
pub mod progression;
pub mod sector;
pub mod segment;

pub use company::{run_company_group, CompanyGroupInput, CompanyInput, CompanyResult};
pub use finance::{amortize, settle_holding, Amortization, FinanceInput, FinanceOutcome};
pub use macro_engine::step_macro;
pub use market::{compute_market_shares, softmax};
pub use progression::{
    apply_xp, progress_player, xp_to_next, ProgressionInput, ProgressionOutcome, TrackDelta,
};
pub use sector::{niche_demand_weight, step_sector, SectorInput, SectorOutcome};
pub use segment::{allocate_segments, SegmentAllocation, SegmentAllocationInput};
