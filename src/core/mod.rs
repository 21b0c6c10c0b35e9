//! Core rule simulation
//!
//! This module contains the rule model and the evaluator that decides what
//! happens to a packet. It provides:
//!
//! - [`firewall`]: Rule, packet and ruleset types
//! - [`matcher`]: First-match evaluation of a packet against a ruleset
//! - [`script`]: Rendering a ruleset as a ufw or netsh script
//! - [`loader`]: Reading rulesets from JSON files
//! - [`error`]: Error types for everything around the evaluator

pub mod error;
pub mod firewall;
pub mod loader;
pub mod matcher;
pub mod script;

#[cfg(test)]
pub mod test_helpers;
