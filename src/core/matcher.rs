//! First-match rule evaluation
//!
//! [`evaluate`] walks a ruleset from the top and stops at the first rule
//! whose direction, protocol, port, source and destination all agree with
//! the packet. If nothing matches the packet is blocked by default.
//!
//! The function is pure: it borrows the rules, keeps no state between
//! calls and never fails. Malformed field values are ordinary strings that
//! simply fail to compare equal.
//!
//! ```
//! use fwsim::core::firewall::{Packet, Ruleset};
//! use fwsim::core::matcher::evaluate;
//!
//! let ruleset = Ruleset::sample();
//! let result = evaluate(&ruleset.rules, &Packet::default());
//!
//! assert!(result.allowed);
//! assert_eq!(result.message, "Packet ALLOWED by rule: Allow HTTP");
//! ```

use serde::Serialize;

use super::firewall::{Packet, Rule, Ruleset, WILDCARD};

/// Message used when no rule matched.
pub const DEFAULT_DENY_MESSAGE: &str = "Packet BLOCKED - No matching rule found (default deny)";

/// How a decision was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Verdict {
    #[strum(serialize = "allowed by rule")]
    AllowedByRule,
    #[strum(serialize = "blocked by rule")]
    BlockedByRule,
    #[strum(serialize = "blocked by default")]
    BlockedByDefault,
}

/// Outcome of evaluating one packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult<'a> {
    /// `true` only when a rule matched and its action is allow
    pub allowed: bool,
    /// First matching rule, if any
    pub matched_rule: Option<&'a Rule>,
    /// 1-based position of `matched_rule` in the ruleset
    pub position: Option<usize>,
    pub message: String,
}

impl<'a> MatchResult<'a> {
    fn matched(position: usize, rule: &'a Rule) -> Self {
        let allowed = rule.action.permits();
        let message = format!(
            "Packet {} by rule: {}",
            if allowed { "ALLOWED" } else { "BLOCKED" },
            rule.description
        );
        Self {
            allowed,
            matched_rule: Some(rule),
            position: Some(position + 1),
            message,
        }
    }

    fn default_deny() -> Self {
        Self {
            allowed: false,
            matched_rule: None,
            position: None,
            message: DEFAULT_DENY_MESSAGE.to_string(),
        }
    }

    pub fn verdict(&self) -> Verdict {
        match (self.matched_rule, self.allowed) {
            (None, _) => Verdict::BlockedByDefault,
            (Some(_), true) => Verdict::AllowedByRule,
            (Some(_), false) => Verdict::BlockedByRule,
        }
    }
}

/// Evaluates `packet` against `rules` in order; the first full match decides.
pub fn evaluate<'a>(rules: &'a [Rule], packet: &Packet) -> MatchResult<'a> {
    rules
        .iter()
        .enumerate()
        .find(|(_, rule)| rule_matches(rule, packet))
        .map_or_else(MatchResult::default_deny, |(i, rule)| {
            MatchResult::matched(i, rule)
        })
}

/// Returns `true` if every field of `rule` accepts `packet`.
///
/// Checks run cheapest-first and stop at the first mismatch.
fn rule_matches(rule: &Rule, packet: &Packet) -> bool {
    rule.direction == packet.direction
        && rule.protocol.matches(packet.protocol)
        && field_matches(&rule.port, &packet.port)
        && field_matches(&rule.source_ip, &packet.source_ip)
        && field_matches(&rule.destination_ip, &packet.destination_ip)
}

#[inline]
fn field_matches(rule_value: &str, packet_value: &str) -> bool {
    rule_value == WILDCARD || rule_value == packet_value
}

impl Ruleset {
    /// Shorthand for [`evaluate`] over this ruleset.
    pub fn evaluate(&self, packet: &Packet) -> MatchResult<'_> {
        evaluate(&self.rules, packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::firewall::{Action, Direction, PacketProtocol, Protocol};

    fn rule(action: Action, protocol: Protocol, port: &str, src: &str, dst: &str) -> Rule {
        Rule::new(action, Direction::Inbound, protocol, port, src, dst, "test")
    }

    fn packet(port: &str) -> Packet {
        Packet::new(
            "10.0.0.5",
            "10.0.0.1",
            port,
            PacketProtocol::Tcp,
            Direction::Inbound,
        )
    }

    #[test]
    fn test_empty_rules_default_deny() {
        let result = evaluate(&[], &packet("22"));
        assert!(!result.allowed);
        assert!(result.matched_rule.is_none());
        assert_eq!(result.message, DEFAULT_DENY_MESSAGE);
        assert_eq!(result.verdict(), Verdict::BlockedByDefault);
    }

    #[test]
    fn test_direction_has_no_wildcard() {
        let rules = [rule(Action::Allow, Protocol::Any, "any", "any", "any")];
        let mut pkt = packet("22");
        pkt.direction = Direction::Outbound;
        assert!(evaluate(&rules, &pkt).matched_rule.is_none());
    }

    #[test]
    fn test_protocol_any_matches_udp() {
        let rules = [rule(Action::Allow, Protocol::Any, "53", "any", "any")];
        let mut pkt = packet("53");
        pkt.protocol = PacketProtocol::Udp;
        assert!(evaluate(&rules, &pkt).allowed);
    }

    #[test]
    fn test_protocol_mismatch() {
        let rules = [rule(Action::Allow, Protocol::Udp, "53", "any", "any")];
        assert!(!evaluate(&rules, &packet("53")).allowed);
    }

    #[test]
    fn test_port_is_compared_as_string() {
        let rules = [rule(Action::Allow, Protocol::Tcp, "80", "any", "any")];
        assert!(evaluate(&rules, &packet("80")).allowed);
        assert!(!evaluate(&rules, &packet("0080")).allowed);
        assert!(!evaluate(&rules, &packet("80-90")).allowed);
    }

    #[test]
    fn test_wildcard_is_case_sensitive() {
        let rules = [rule(Action::Allow, Protocol::Tcp, "ANY", "any", "any")];
        assert!(evaluate(&rules, &packet("22")).matched_rule.is_none());
    }

    #[test]
    fn test_cidr_is_not_subnet_match() {
        let rules = [rule(Action::Allow, Protocol::Tcp, "22", "10.0.0.0/24", "any")];
        assert!(evaluate(&rules, &packet("22")).matched_rule.is_none());
    }

    #[test]
    fn test_destination_must_match() {
        let rules = [rule(Action::Allow, Protocol::Tcp, "22", "any", "10.0.0.2")];
        assert!(evaluate(&rules, &packet("22")).matched_rule.is_none());

        let rules = [rule(Action::Allow, Protocol::Tcp, "22", "any", "10.0.0.1")];
        assert!(evaluate(&rules, &packet("22")).allowed);
    }

    #[test]
    fn test_reject_blocks_like_deny() {
        let rules = [rule(Action::Reject, Protocol::Tcp, "22", "any", "any")];
        let result = evaluate(&rules, &packet("22"));
        assert!(!result.allowed);
        assert_eq!(result.verdict(), Verdict::BlockedByRule);
        assert_eq!(result.message, "Packet BLOCKED by rule: test");
        assert_eq!(result.matched_rule.map(|r| r.action), Some(Action::Reject));
    }

    #[test]
    fn test_position_is_one_based() {
        let rules = [
            rule(Action::Allow, Protocol::Udp, "any", "any", "any"),
            rule(Action::Allow, Protocol::Tcp, "any", "any", "any"),
        ];
        assert_eq!(evaluate(&rules, &packet("22")).position, Some(2));
    }

    #[test]
    fn test_result_borrows_matched_rule() {
        let ruleset = Ruleset::sample();
        let result = ruleset.evaluate(&Packet::default());
        assert!(std::ptr::eq(
            result.matched_rule.unwrap(),
            &ruleset.rules[1]
        ));
    }
}
