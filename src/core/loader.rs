//! Reading user-supplied rules files
//!
//! A rules file is JSON, either a bare array of rules or an object with a
//! `rules` array:
//!
//! ```json
//! [
//!   { "action": "allow", "direction": "inbound", "protocol": "tcp",
//!     "port": "22", "sourceIP": "any", "destinationIP": "any",
//!     "description": "Allow SSH" }
//! ]
//! ```
//!
//! Rules without an `id` get a fresh one. Files are only ever read; the tool
//! does not write rulesets back.

use std::path::Path;

use super::error::{Error, Result};
use super::firewall::{Rule, Ruleset};

/// Parses a ruleset from JSON text and checks its limits.
///
/// # Errors
///
/// Returns `Err` on malformed JSON, more than
/// [`MAX_RULES`](super::firewall::MAX_RULES) rules or duplicate ids.
pub fn parse_ruleset(json: &str) -> Result<Ruleset> {
    let ruleset = if json.trim_start().starts_with('[') {
        Ruleset::from(serde_json::from_str::<Vec<Rule>>(json)?)
    } else {
        serde_json::from_str::<Ruleset>(json)?
    };

    ruleset.check_limits()?;
    Ok(ruleset)
}

/// Loads a ruleset from `path`.
///
/// # Async
/// Uses `tokio::fs` for non-blocking file I/O.
///
/// # Errors
///
/// Returns `Err` if the file cannot be read or fails [`parse_ruleset`].
pub async fn load_ruleset(path: &Path) -> Result<Ruleset> {
    if !tokio::fs::try_exists(path).await? {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("rules file not found: {}", path.display()),
        )));
    }

    let json = tokio::fs::read_to_string(path).await?;
    let ruleset = parse_ruleset(&json)?;

    tracing::info!("Loaded {} rules from {}", ruleset.len(), path.display());
    Ok(ruleset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::firewall::{Action, MAX_RULES, Protocol};

    const SSH_RULE: &str = r#"{"action":"allow","direction":"inbound","protocol":"tcp","port":"22","sourceIP":"any","destinationIP":"any","description":"Allow SSH"}"#;

    #[test]
    fn test_parse_bare_array() {
        let ruleset = parse_ruleset(&format!("[{SSH_RULE}]")).unwrap();
        assert_eq!(ruleset.len(), 1);
        assert_eq!(ruleset.rules[0].action, Action::Allow);
        assert_eq!(ruleset.rules[0].protocol, Protocol::Tcp);
        assert_eq!(ruleset.rules[0].description, "Allow SSH");
    }

    #[test]
    fn test_parse_wrapped_object() {
        let ruleset = parse_ruleset(&format!(r#"{{"rules":[{SSH_RULE},{SSH_RULE}]}}"#)).unwrap();
        assert_eq!(ruleset.len(), 2);
        // Fresh ids for each rule without one
        assert_ne!(ruleset.rules[0].id, ruleset.rules[1].id);
    }

    #[test]
    fn test_missing_addresses_default_to_wildcard() {
        let ruleset = parse_ruleset(
            r#"[{"action":"deny","direction":"outbound","protocol":"any","port":"any"}]"#,
        )
        .unwrap();
        assert!(ruleset.rules[0].any_source());
        assert!(ruleset.rules[0].any_destination());
        assert!(ruleset.rules[0].description.is_empty());
    }

    #[test]
    fn test_unknown_action_rejected() {
        let err = parse_ruleset(
            r#"[{"action":"drop","direction":"inbound","protocol":"tcp","port":"22"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let rule = r#"{"id":"6f1c1c3e-2d9b-4c8e-9a57-0f0d6a3b9e11","action":"allow","direction":"inbound","protocol":"tcp","port":"22"}"#;
        let err = parse_ruleset(&format!("[{rule},{rule}]")).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "id"));
    }

    #[test]
    fn test_too_many_rules_rejected() {
        let body = vec![SSH_RULE; MAX_RULES + 1].join(",");
        let err = parse_ruleset(&format!("[{body}]")).unwrap_err();
        assert!(err.to_string().contains("max: 1000"));
    }

    #[test]
    fn test_order_preserved() {
        let json = r#"[
            {"action":"deny","direction":"inbound","protocol":"tcp","port":"80","description":"first"},
            {"action":"allow","direction":"inbound","protocol":"tcp","port":"80","description":"second"}
        ]"#;
        let ruleset = parse_ruleset(json).unwrap();
        assert_eq!(ruleset.rules[0].description, "first");
        assert_eq!(ruleset.rules[1].description, "second");
    }
}
