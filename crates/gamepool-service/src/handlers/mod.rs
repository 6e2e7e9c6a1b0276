//! API handlers.

pub mod games;
pub mod health;
