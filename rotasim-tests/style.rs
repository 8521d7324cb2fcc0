//! Style Enforcement Tests
//!
//! Scans the workspace crates for patterns clippy does not reject on its own.
//!
//! # Test Organization
//!
//! - `production_code` - No `#[allow(dead_code)]`, `.unwrap()` or `.expect(`
//!   outside test modules

#[path = "style/production_code.rs"]
mod production_code;
