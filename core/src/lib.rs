//! Loan amortization and repayment allocation engine.
//!
//! The numeric core of a Sacco/bank backend: given loans whose
//! lifecycle decisions were made elsewhere, this crate computes their
//! consequences — instalment schedules under three interest plans,
//! payment allocation under a fixed waterfall, mid-life schedule
//! regeneration that preserves settled history, retroactive schedule
//! backfill, and the delinquency sweep.
//!
//! Module map:
//!   - [`engine`]: the facade; one method per operation, one
//!     transaction per call.
//!   - [`schedule`], [`allocation`], [`restructure`], [`backfill`],
//!     [`delinquency`]: the five components.
//!   - [`store`]: the SQLite layer; only it talks to the database.
//!   - [`config`], [`money`], [`event`], [`error`], [`types`]: resolved
//!     product terms, rounding rules, the audit log, and shared types.

pub mod allocation;
pub mod backfill;
pub mod config;
pub mod delinquency;
pub mod engine;
pub mod error;
pub mod event;
pub mod money;
pub mod restructure;
pub mod schedule;
pub mod store;
pub mod types;
