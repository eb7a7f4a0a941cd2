// Business profile and the (mocked) Instagram account link.

pub mod handlers;
pub mod queries;
