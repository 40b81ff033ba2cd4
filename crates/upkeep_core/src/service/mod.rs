//! Scheduler use-case services.
//!
//! # Responsibility
//! - Expose the single scheduler entry point to outer callers.
//! - Normalize caller input (lookahead) and inject time.
//! - Keep callers decoupled from store and stage details.

pub mod clock;
pub mod lookahead;
pub mod scheduler_service;
