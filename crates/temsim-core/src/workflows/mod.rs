//! # Workflows Module
//!
//! The highest-level, user-facing layer: complete simulation procedures that
//! tie the engine and core together behind a single entry point.

pub mod scan;
