//! API Routes
//!
//! Route handlers organized by functionality.

pub mod capture;
pub mod health;
pub mod stats;
