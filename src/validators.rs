//! Input validation and sanitization
//!
//! The matcher accepts any string and treats bad values as non-matches.
//! These checks run upstream, where rule and packet input is collected, so
//! that typos are reported instead of silently never matching.

use std::net::IpAddr;

use crate::core::firewall::WILDCARD;

/// Sanitizes a label for safe use in script comments and rule names.
///
/// Keeps ASCII alphanumerics and ` -_.:()/`, drops everything else (quotes,
/// control characters, shell metacharacters) and limits the result to 64
/// characters.
///
/// # Examples
///
/// ```
/// use fwsim::validators::sanitize_label;
///
/// assert_eq!(sanitize_label("Allow SSH"), "Allow SSH");
///
/// let safe = sanitize_label("x\"; rm -rf / #");
/// assert!(!safe.contains('"'));
/// assert!(!safe.contains(';'));
/// ```
pub fn sanitize_label(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | ':' | '(' | ')' | '/'))
        .take(64)
        .collect()
}

/// Validates a rule description.
///
/// # Errors
///
/// Returns `Err` if the description is blank or longer than 64 characters.
pub fn validate_description(input: &str) -> Result<String, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("Description cannot be empty".to_string());
    }
    if trimmed.chars().count() > 64 {
        return Err("Description too long (max 64 characters)".to_string());
    }
    Ok(trimmed.to_string())
}

/// Validates a port field: the wildcard or a single decimal port 0-65535.
///
/// The value is returned as typed (minus surrounding whitespace), since the
/// matcher compares ports as strings.
///
/// # Errors
///
/// Returns `Err` for ranges, lists, names or out-of-range numbers.
///
/// ```
/// use fwsim::validators::validate_port;
///
/// assert_eq!(validate_port(" 443 ").unwrap(), "443");
/// assert!(validate_port("any").is_ok());
/// assert!(validate_port("80-90").is_err());
/// assert!(validate_port("70000").is_err());
/// ```
pub fn validate_port(input: &str) -> Result<String, String> {
    let trimmed = input.trim();
    if trimmed == WILDCARD {
        return Ok(trimmed.to_string());
    }
    if trimmed.is_empty() {
        return Err("Port cannot be empty (use \"any\" to match every port)".to_string());
    }
    if !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("Invalid port \"{trimmed}\": expected a number or \"any\""));
    }
    match trimmed.parse::<u16>() {
        Ok(_) => Ok(trimmed.to_string()),
        Err(_) => Err(format!("Port {trimmed} out of range (0-65535)")),
    }
}

/// Validates an address field: the wildcard or a literal IPv4/IPv6 address.
///
/// Networks in CIDR notation are refused because the matcher only does
/// exact comparisons and such a rule could never match.
///
/// # Errors
///
/// Returns `Err` if the value is neither `any` nor a parseable address.
pub fn validate_ip(input: &str) -> Result<String, String> {
    let trimmed = input.trim();
    if trimmed == WILDCARD {
        return Ok(trimmed.to_string());
    }
    if trimmed.contains('/') {
        return Err(format!(
            "\"{trimmed}\" is a network; only single addresses are supported"
        ));
    }
    trimmed
        .parse::<IpAddr>()
        .map(|_| trimmed.to_string())
        .map_err(|_| format!("Invalid IP address \"{trimmed}\""))
}

/// Validates a packet address: like [`validate_ip`], but the wildcard is
/// refused since a packet always has a concrete address.
///
/// # Errors
///
/// Returns `Err` for `any` or anything [`validate_ip`] rejects.
pub fn validate_packet_ip(input: &str) -> Result<String, String> {
    let address = validate_ip(input)?;
    if address == WILDCARD {
        return Err("A packet needs a concrete address, not \"any\"".to_string());
    }
    Ok(address)
}

/// Validates a packet port: like [`validate_port`], without the wildcard.
///
/// # Errors
///
/// Returns `Err` for `any` or anything [`validate_port`] rejects.
pub fn validate_packet_port(input: &str) -> Result<String, String> {
    let port = validate_port(input)?;
    if port == WILDCARD {
        return Err("A packet needs a concrete port, not \"any\"".to_string());
    }
    Ok(port)
}

/// Returns a hint for well-known ports, used when listing rules.
pub fn check_well_known_port(port: &str) -> Option<&'static str> {
    match port {
        "21" => Some("FTP"),
        "22" => Some("SSH"),
        "23" => Some("Telnet (insecure)"),
        "25" => Some("SMTP"),
        "53" => Some("DNS"),
        "80" => Some("HTTP"),
        "123" => Some("NTP"),
        "135" => Some("RPC"),
        "139" => Some("NetBIOS"),
        "443" => Some("HTTPS"),
        "445" => Some("SMB"),
        "1433" => Some("SQL Server"),
        "3306" => Some("MySQL"),
        "3389" => Some("RDP"),
        "5432" => Some("PostgreSQL"),
        "6379" => Some("Redis"),
        "27017" => Some("MongoDB"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_label_strips_quotes() {
        assert_eq!(sanitize_label("Web \"Server\""), "Web Server");
    }

    #[test]
    fn test_sanitize_label_keeps_punctuation() {
        assert_eq!(sanitize_label("RDP (mgmt) 10.0.0.1/32"), "RDP (mgmt) 10.0.0.1/32");
    }

    #[test]
    fn test_validate_description_trims() {
        assert_eq!(validate_description("  Allow SSH ").unwrap(), "Allow SSH");
        assert!(validate_description("   ").is_err());
        assert!(validate_description(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_port_bounds() {
        assert!(validate_port("0").is_ok());
        assert!(validate_port("65535").is_ok());
        assert!(validate_port("65536").is_err());
        assert!(validate_port("-1").is_err());
        assert!(validate_port("").is_err());
    }

    #[test]
    fn test_validate_port_keeps_leading_zeros() {
        assert_eq!(validate_port("0080").unwrap(), "0080");
    }

    #[test]
    fn test_validate_port_wildcard_is_lowercase_only() {
        assert!(validate_port("ANY").is_err());
    }

    #[test]
    fn test_validate_ip() {
        assert!(validate_ip("192.168.1.100").is_ok());
        assert!(validate_ip("2001:db8::1").is_ok());
        assert!(validate_ip("any").is_ok());
        assert!(validate_ip("192.168.1.0/24").is_err());
        assert!(validate_ip("192.168.1.300").is_err());
        assert!(validate_ip("localhost").is_err());
    }

    #[test]
    fn test_packet_fields_refuse_wildcard() {
        assert!(validate_packet_ip("any").is_err());
        assert!(validate_packet_port("any").is_err());
        assert_eq!(validate_packet_ip(" 10.0.0.1").unwrap(), "10.0.0.1");
        assert_eq!(validate_packet_port("22").unwrap(), "22");
        assert!(validate_packet_port("http").is_err());
    }

    #[test]
    fn test_check_well_known_port() {
        assert_eq!(check_well_known_port("22"), Some("SSH"));
        assert_eq!(check_well_known_port("8080"), None);
    }
}
