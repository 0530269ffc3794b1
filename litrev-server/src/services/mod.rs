//! Business services sitting between the API handlers and the database

pub mod ai_client;
pub mod eligibility;
pub mod job_runner;
pub mod job_tracker;
pub mod lifecycle;
pub mod signup_limiter;

pub use ai_client::{AiError, LanguageModel, OpenAiClient};
pub use job_tracker::JobTracker;
pub use signup_limiter::SignupLimiter;
