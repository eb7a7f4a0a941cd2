pub mod analytics;
pub mod business_profile;
pub mod post;
pub mod user;
