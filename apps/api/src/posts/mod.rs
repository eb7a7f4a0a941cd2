// Post authoring: drafts and scheduled posts gated by the entitlement guard,
// and publishing through the social publisher.
// "Scheduled" only stores a timestamp; nothing dispatches posts at that time.

pub mod handlers;
pub mod queries;
