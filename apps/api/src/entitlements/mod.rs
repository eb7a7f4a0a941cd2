// Entitlement core: tier allowances, per-user monthly usage, and the post-creation gate.
// The gate's check and increment run as one conditional update in the account store.

pub mod guard;
pub mod handlers;
pub mod table;
pub mod usage;

pub use guard::{EntitlementGuard, EntitlementSummary, PostDecision};
pub use usage::UsageCounter;
