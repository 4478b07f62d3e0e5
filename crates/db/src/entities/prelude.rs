//! Entity re-exports.

pub use super::approval_history::Entity as ApprovalHistory;
pub use super::approval_requests::Entity as ApprovalRequests;
pub use super::approval_rule_approvers::Entity as ApprovalRuleApprovers;
pub use super::approval_rules::Entity as ApprovalRules;
pub use super::companies::Entity as Companies;
pub use super::exchange_rates::Entity as ExchangeRates;
pub use super::expenses::Entity as Expenses;
pub use super::users::Entity as Users;
