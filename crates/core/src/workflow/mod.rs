//! Expense approval workflow.
//!
//! # Modules
//!
//! - `types` - Workflow domain types (ExpenseStatus, RuleType, Decision)
//! - `error` - Workflow-specific error types
//! - `approval` - Rule definitions and validation
//! - `chain` - Approval request materialisation
//! - `policy` - Turn checks and resolution policy
//! - `service` - Expense status transitions
//! - `audit` - Audit trail entries

pub mod approval;
pub mod audit;
pub mod chain;
pub mod error;
pub mod policy;
pub mod service;
pub mod types;

#[cfg(test)]
mod approval_props;
#[cfg(test)]
mod policy_props;
#[cfg(test)]
mod service_props;

pub use approval::{ApproverProfile, RuleApprover, RuleDraft, RuleValidator, UserRole};
pub use audit::{Actor, AuditEntry, HistoryAction};
pub use chain::{ApprovalChain, ChainStep};
pub use error::{ErrorKind, WorkflowError};
pub use policy::{DecisionPolicy, PolicyOutcome, RequestState, RulePolicy, Tally};
pub use service::WorkflowService;
pub use types::{Decision, ExpenseStatus, RequestStatus, RuleType, WorkflowAction};
