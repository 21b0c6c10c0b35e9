//! fwsim - Firewall Rule Simulator
//!
//! Tests synthetic packets against an ordered list of firewall rules and
//! reports whether each one would be allowed or blocked.
//!
//! # Architecture
//!
//! - [`core`] - Rule and packet types, the first-match matcher, rules file
//!   loading and script rendering
//! - [`command`] - Undo/redo command pattern for ruleset edits
//! - [`session`] - Interactive line-based rule editor
//! - [`export`] - Ready-made firewall script templates
//! - [`validators`] - Input validation and sanitization
//! - [`config`] - Configuration persistence
//! - [`utils`] - Utility functions (XDG directories)
//!
//! # Matching
//!
//! Rules are checked top to bottom and the first rule whose direction,
//! protocol, port, source and destination all match decides. A packet no rule
//! matches is blocked. Fields compare as exact strings, with `"any"` as the
//! only wildcard.
//!
//! ```
//! use fwsim::{Packet, Ruleset};
//!
//! let ruleset = Ruleset::sample();
//! let result = ruleset.evaluate(&Packet::default());
//!
//! assert!(result.allowed);
//! assert_eq!(result.message, "Packet ALLOWED by rule: Allow HTTP");
//! ```

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]

pub mod command;
pub mod config;
pub mod core;
pub mod export;
pub mod session;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use core::error::{Error, Result};
pub use core::firewall::{Action, Direction, Packet, PacketProtocol, Protocol, Rule, Ruleset};
pub use core::matcher::{MatchResult, evaluate};
