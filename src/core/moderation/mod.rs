// Core moderation module - spam scoring and per-sender rate limiting.
// Leaves first: models -> rules -> signals -> scoring -> rate limiter -> engine.

pub mod filter_rules;
pub mod moderation_models;
pub mod moderation_service;
pub mod rate_limiter;
pub mod scoring;
pub mod signals;

pub use moderation_models::*;
pub use moderation_service::*;
