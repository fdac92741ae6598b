pub mod health;
pub mod jobs;
pub mod suppressions;
pub mod webhooks;
