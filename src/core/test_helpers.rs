//! Shared test utilities for core module tests
//!
//! Compact constructors so scenario tests read like rule tables.

use crate::core::firewall::{Action, Direction, Packet, PacketProtocol, Protocol, Rule, Ruleset};

/// Creates an inbound rule.
///
/// # Arguments
///
/// * `action` - What to do with matching packets
/// * `protocol` - Protocol selector (`Protocol::Any` for all)
/// * `port` - Port string or `"any"`
/// * `source` - Source address or `"any"`
/// * `destination` - Destination address or `"any"`
pub fn inbound(
    action: Action,
    protocol: Protocol,
    port: &str,
    source: &str,
    destination: &str,
) -> Rule {
    Rule::new(
        action,
        Direction::Inbound,
        protocol,
        port,
        source,
        destination,
        format!("{action} {protocol}/{port} from {source} to {destination}"),
    )
}

/// Creates an inbound TCP packet from 10.0.0.5 to 10.0.0.1.
pub fn tcp_packet(port: &str) -> Packet {
    Packet::new(
        "10.0.0.5",
        "10.0.0.1",
        port,
        PacketProtocol::Tcp,
        Direction::Inbound,
    )
}

/// The SSH-allow / deny-everything ruleset used in several scenarios.
pub fn ssh_then_deny_all() -> Ruleset {
    Ruleset::from(vec![
        inbound(Action::Allow, Protocol::Tcp, "22", "any", "any"),
        inbound(Action::Deny, Protocol::Any, "any", "any", "any"),
    ])
}
