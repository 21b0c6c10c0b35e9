//! Firewall rule data structures
//!
//! This module defines the values the simulator works on:
//!
//! - [`Rule`]: one immutable entry of a ruleset (action, direction, protocol,
//!   port, source/destination address and a free-text description)
//! - [`Packet`]: a synthetic test packet
//! - [`Ruleset`]: an ordered list of rules, where position is priority
//! - [`RuleDraft`]: form-style builder that turns user input into a [`Rule`]
//!
//! Port and address fields are plain strings. The literal [`WILDCARD`]
//! (`"any"`) matches every value; everything else is compared verbatim, so
//! `"80"` and `"0080"` are different ports and `192.168.1.0/24` is just a
//! string that never equals a packet address.
//!
//! # Example
//!
//! ```
//! use fwsim::core::firewall::{Action, Direction, Protocol, RuleDraft};
//!
//! let rule = RuleDraft {
//!     action: Action::Allow,
//!     direction: Direction::Inbound,
//!     protocol: Protocol::Tcp,
//!     port: "443".to_string(),
//!     description: "Allow HTTPS".to_string(),
//!     ..RuleDraft::default()
//! }
//! .into_rule()
//! .unwrap();
//!
//! assert_eq!(rule.source_ip, "any");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::error::{Error, Result};

/// Literal that matches any value in port and address fields.
pub const WILDCARD: &str = "any";

/// Maximum number of rules accepted from a rules file
///
/// Limit prevents memory exhaustion from malformed files.
pub const MAX_RULES: usize = 1000;

/// What happens to a packet that matches a rule
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    Default,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Let the packet through
    #[default]
    #[strum(serialize = "allow")]
    Allow,
    /// Drop the packet silently
    #[strum(serialize = "deny")]
    Deny,
    /// Drop the packet and tell the sender
    #[strum(serialize = "reject")]
    Reject,
}

impl Action {
    /// Returns uppercase name for rule listings
    pub const fn display_name(self) -> &'static str {
        match self {
            Action::Allow => "ALLOW",
            Action::Deny => "DENY",
            Action::Reject => "REJECT",
        }
    }

    /// Only `allow` lets a packet through; deny and reject both block.
    pub const fn permits(self) -> bool {
        matches!(self, Action::Allow)
    }
}

/// Traffic direction relative to the host
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    Default,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    #[strum(serialize = "inbound")]
    Inbound,
    #[strum(serialize = "outbound")]
    Outbound,
}

/// Protocol selector on a rule
///
/// `Any` is a wildcard. Packets carry a [`PacketProtocol`], which has no
/// wildcard variant.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    Default,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Transmission Control Protocol
    #[default]
    #[strum(serialize = "tcp")]
    Tcp,
    /// User Datagram Protocol
    #[strum(serialize = "udp")]
    Udp,
    /// Match all protocols
    #[strum(serialize = "any")]
    Any,
}

impl Protocol {
    /// Returns display name for rule listings
    pub const fn display_name(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Any => "ANY",
        }
    }

    /// Returns `true` if a packet using `protocol` satisfies this selector.
    #[inline]
    pub fn matches(self, protocol: PacketProtocol) -> bool {
        match self {
            Protocol::Any => true,
            Protocol::Tcp => protocol == PacketProtocol::Tcp,
            Protocol::Udp => protocol == PacketProtocol::Udp,
        }
    }
}

/// Concrete transport protocol of a test packet
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    Default,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum PacketProtocol {
    #[default]
    #[strum(serialize = "tcp")]
    Tcp,
    #[strum(serialize = "udp")]
    Udp,
}

/// A single firewall rule
///
/// Rules are never modified after creation. Callers change a ruleset by
/// removing and adding whole rules (see [`crate::command`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    /// Fresh identifier assigned at creation; a missing id in a rules file
    /// gets a new one on load
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub action: Action,
    pub direction: Direction,
    pub protocol: Protocol,
    /// Single port as typed, or `"any"`
    pub port: String,
    /// Literal address as typed, or `"any"`
    #[serde(rename = "sourceIP", default = "wildcard")]
    pub source_ip: String,
    #[serde(rename = "destinationIP", default = "wildcard")]
    pub destination_ip: String,
    /// Label used only for reporting
    #[serde(default)]
    pub description: String,
}

fn wildcard() -> String {
    WILDCARD.to_string()
}

impl Rule {
    /// Creates a rule with a fresh id.
    pub fn new(
        action: Action,
        direction: Direction,
        protocol: Protocol,
        port: impl Into<String>,
        source_ip: impl Into<String>,
        destination_ip: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            direction,
            protocol,
            port: port.into(),
            source_ip: source_ip.into(),
            destination_ip: destination_ip.into(),
            description: description.into(),
        }
    }

    /// Returns `true` if the port field is the wildcard
    pub fn any_port(&self) -> bool {
        self.port == WILDCARD
    }

    /// Returns `true` if the source field is the wildcard
    pub fn any_source(&self) -> bool {
        self.source_ip == WILDCARD
    }

    /// Returns `true` if the destination field is the wildcard
    pub fn any_destination(&self) -> bool {
        self.destination_ip == WILDCARD
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} | {} | Port: {} | From: {} | To: {}",
            self.action.display_name(),
            self.direction,
            self.protocol.display_name(),
            self.port,
            self.source_ip,
            self.destination_ip
        )?;
        if !self.description.is_empty() {
            write!(f, " - {}", self.description)?;
        }
        Ok(())
    }
}

/// A synthetic packet to test against a ruleset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Packet {
    #[serde(rename = "sourceIP")]
    pub source_ip: String,
    #[serde(rename = "destinationIP")]
    pub destination_ip: String,
    pub port: String,
    pub protocol: PacketProtocol,
    pub direction: Direction,
}

impl Packet {
    pub fn new(
        source_ip: impl Into<String>,
        destination_ip: impl Into<String>,
        port: impl Into<String>,
        protocol: PacketProtocol,
        direction: Direction,
    ) -> Self {
        Self {
            source_ip: source_ip.into(),
            destination_ip: destination_ip.into(),
            port: port.into(),
            protocol,
            direction,
        }
    }
}

impl Default for Packet {
    /// Inbound HTTP from a LAN host, the simulator's starting packet
    fn default() -> Self {
        Self::new(
            "192.168.1.100",
            "192.168.1.1",
            "80",
            PacketProtocol::Tcp,
            Direction::Inbound,
        )
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} -> {} port {}",
            self.direction, self.protocol, self.source_ip, self.destination_ip, self.port
        )
    }
}

/// Ordered list of rules; index order is evaluation order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ruleset {
    pub rules: Vec<Rule>,
}

impl Ruleset {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The three starter rules: SSH and HTTP allowed, everything else inbound denied.
    pub fn sample() -> Self {
        Self {
            rules: vec![
                Rule::new(
                    Action::Allow,
                    Direction::Inbound,
                    Protocol::Tcp,
                    "22",
                    WILDCARD,
                    WILDCARD,
                    "Allow SSH",
                ),
                Rule::new(
                    Action::Allow,
                    Direction::Inbound,
                    Protocol::Tcp,
                    "80",
                    WILDCARD,
                    WILDCARD,
                    "Allow HTTP",
                ),
                Rule::new(
                    Action::Deny,
                    Direction::Inbound,
                    Protocol::Any,
                    WILDCARD,
                    WILDCARD,
                    WILDCARD,
                    "Default deny all",
                ),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Position of the rule with `id`, if present.
    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.rules.iter().position(|r| r.id == id)
    }

    /// Checks the structural limits applied to externally supplied rulesets:
    /// at most [`MAX_RULES`] rules and no repeated ids.
    pub fn check_limits(&self) -> Result<()> {
        if self.rules.len() > MAX_RULES {
            return Err(Error::Validation {
                field: "rules".to_string(),
                message: format!(
                    "ruleset contains {} rules (max: {MAX_RULES})",
                    self.rules.len()
                ),
            });
        }

        for (i, rule) in self.rules.iter().enumerate() {
            if self.rules[i + 1..].iter().any(|r| r.id == rule.id) {
                return Err(Error::Validation {
                    field: "id".to_string(),
                    message: format!("duplicate rule id {}", rule.id),
                });
            }
        }

        Ok(())
    }
}

impl From<Vec<Rule>> for Ruleset {
    fn from(rules: Vec<Rule>) -> Self {
        Self { rules }
    }
}

/// Input for a new rule, with the same defaults as the add-rule form
///
/// Port and description start empty and must be filled in; source and
/// destination start as the wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDraft {
    pub action: Action,
    pub direction: Direction,
    pub protocol: Protocol,
    pub port: String,
    pub source_ip: String,
    pub destination_ip: String,
    pub description: String,
}

impl Default for RuleDraft {
    fn default() -> Self {
        Self {
            action: Action::Allow,
            direction: Direction::Inbound,
            protocol: Protocol::Tcp,
            port: String::new(),
            source_ip: wildcard(),
            destination_ip: wildcard(),
            description: String::new(),
        }
    }
}

impl RuleDraft {
    /// Builds the rule, assigning a fresh id.
    ///
    /// Blank addresses fall back to the wildcard. Only presence is checked
    /// here; format checks live in [`crate::validators`].
    pub fn into_rule(self) -> Result<Rule> {
        if self.port.trim().is_empty() {
            return Err(Error::Validation {
                field: "port".to_string(),
                message: "port is required (use \"any\" to match every port)".to_string(),
            });
        }
        if self.description.trim().is_empty() {
            return Err(Error::Validation {
                field: "description".to_string(),
                message: "description is required".to_string(),
            });
        }

        let or_wildcard = |value: String| {
            if value.trim().is_empty() {
                wildcard()
            } else {
                value
            }
        };

        Ok(Rule::new(
            self.action,
            self.direction,
            self.protocol,
            self.port,
            or_wildcard(self.source_ip),
            or_wildcard(self.destination_ip),
            self.description,
        ))
    }
}
