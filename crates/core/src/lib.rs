//! Core business logic for Outlay.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Rule validation, approval routing and resolution, and currency arithmetic
//! live here; the db crate persists what these modules decide.
//!
//! # Modules
//!
//! - `workflow` - Approval rules, request chains, decision policy, audit entries
//! - `currency` - Exchange rates and the converter abstraction
//! - `hierarchy` - Manager hierarchy cycle detection

pub mod currency;
pub mod hierarchy;
pub mod workflow;
