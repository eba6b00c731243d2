//! Flow control infrastructure.
//!
//! Provides:
//! - Credit-based demand accounting for upstream producers
//! - Saturating capacity arithmetic for the batch writer budget

pub mod credit;
