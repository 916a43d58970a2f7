//! Engine audit events.
//!
//! Every mutating engine operation appends one event to the loan's
//! audit trail, inside the same transaction as the mutation itself.
//! Collections and reporting read this log; nothing in the engine
//! reads it back.

use crate::types::{LoanId, Money};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Every event emitted by the engine. Variants are added, never
/// removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    ScheduleGenerated {
        loan_id: LoanId,
        instalments: usize,
        method: String,
    },
    RepaymentAllocated {
        loan_id: LoanId,
        repayment_id: String,
        amount: Money,
        principal: Money,
        interest: Money,
        penalty: Money,
        insurance: Money,
        overpayment: Money,
    },
    ScheduleRegenerated {
        loan_id: LoanId,
        settled: usize,
        regenerated: usize,
    },
    BackfillCompleted {
        loan_id: LoanId,
        instalments: usize,
        repayments_replayed: usize,
    },
    DefaultFlagged {
        loan_id: LoanId,
        days_overdue: i64,
        amount_overdue: Money,
    },
    DefaultUpdated {
        loan_id: LoanId,
        days_overdue: i64,
        amount_overdue: Money,
    },
    DefaultResolved {
        loan_id: LoanId,
    },
    LoanSettled {
        loan_id: LoanId,
    },
}

impl EngineEvent {
    /// Stable string name for the event_log's event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            EngineEvent::ScheduleGenerated { .. } => "schedule_generated",
            EngineEvent::RepaymentAllocated { .. } => "repayment_allocated",
            EngineEvent::ScheduleRegenerated { .. } => "schedule_regenerated",
            EngineEvent::BackfillCompleted { .. } => "backfill_completed",
            EngineEvent::DefaultFlagged { .. } => "default_flagged",
            EngineEvent::DefaultUpdated { .. } => "default_updated",
            EngineEvent::DefaultResolved { .. } => "default_resolved",
            EngineEvent::LoanSettled { .. } => "loan_settled",
        }
    }

    pub fn loan_id(&self) -> &str {
        match self {
            EngineEvent::ScheduleGenerated { loan_id, .. }
            | EngineEvent::RepaymentAllocated { loan_id, .. }
            | EngineEvent::ScheduleRegenerated { loan_id, .. }
            | EngineEvent::BackfillCompleted { loan_id, .. }
            | EngineEvent::DefaultFlagged { loan_id, .. }
            | EngineEvent::DefaultUpdated { loan_id, .. }
            | EngineEvent::DefaultResolved { loan_id }
            | EngineEvent::LoanSettled { loan_id } => loan_id,
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub loan_id: LoanId,
    pub event_type: String,
    pub payload: String, // JSON-serialized EngineEvent
    pub recorded_on: NaiveDate,
}
