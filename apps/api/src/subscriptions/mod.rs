// Subscription lifecycle: plan selection, cancellation and post-payment refresh,
// coordinated with the billing collaborator and serialized per user.

pub mod handlers;
pub mod lifecycle;

pub use lifecycle::{PlanSelection, SubscriptionLifecycle};
