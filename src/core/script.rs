//! Rendering a ruleset as an operating-system firewall script
//!
//! - [`Ruleset::to_ufw_script`]: bash script for Ubuntu's `ufw`
//! - [`Ruleset::to_netsh_script`]: batch script for `netsh advfirewall`
//!
//! `ufw` evaluates rules top to bottom like the simulator, so the order is
//! kept and both default policies are set to deny. Windows Firewall has no
//! rule order (block rules always win over allow rules), which the netsh
//! output notes in a comment.

use std::fmt::Write;

use super::firewall::{Action, Direction, Protocol, Rule, Ruleset, WILDCARD};
use crate::validators::{sanitize_label, validate_ip, validate_port};

/// Target firewall for [`Ruleset::render`]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum ScriptFormat {
    /// Linux Uncomplicated Firewall
    #[strum(serialize = "ufw")]
    Ufw,
    /// Windows Firewall with Advanced Security
    #[strum(serialize = "netsh")]
    Netsh,
}

fn rule_name(rule: &Rule, position: usize) -> String {
    let label = sanitize_label(&rule.description);
    if label.is_empty() {
        format!("fwsim rule {position}")
    } else {
        label
    }
}

/// Name of the first field that cannot go into a script verbatim.
///
/// Rules files are not validated on load, so port and addresses are checked
/// here. The value must be exactly what the validator returns, which also
/// rules out surrounding whitespace and line breaks.
fn unsafe_field(rule: &Rule) -> Option<&'static str> {
    let exact = |checked: Result<String, String>, raw: &str| checked.is_ok_and(|v| v == raw);

    if !exact(validate_port(&rule.port), &rule.port) {
        Some("port")
    } else if !exact(validate_ip(&rule.source_ip), &rule.source_ip) {
        Some("source")
    } else if !exact(validate_ip(&rule.destination_ip), &rule.destination_ip) {
        Some("destination")
    } else {
        None
    }
}

fn generated_at() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

impl Ruleset {
    pub fn render(&self, format: ScriptFormat) -> String {
        match format {
            ScriptFormat::Ufw => self.to_ufw_script(),
            ScriptFormat::Netsh => self.to_netsh_script(),
        }
    }

    /// Generates a `ufw` script reproducing this ruleset in order.
    pub fn to_ufw_script(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "#!/bin/bash");
        let _ = writeln!(out, "# UFW configuration generated by fwsim on {}", generated_at());
        let _ = writeln!(out, "# Run with sudo privileges\n");

        let _ = writeln!(out, "ufw --force reset\n");

        // Unmatched packets are denied in both directions, same as the simulator
        let _ = writeln!(out, "# --- Default Policies ---");
        let _ = writeln!(out, "ufw default deny incoming");
        let _ = writeln!(out, "ufw default deny outgoing\n");

        if !self.rules.is_empty() {
            let _ = writeln!(out, "# --- Rules (first match wins) ---");
            for (i, rule) in self.rules.iter().enumerate() {
                Self::write_ufw_rule(&mut out, rule, i + 1);
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "ufw enable");
        let _ = writeln!(out, "ufw status numbered");

        out
    }

    fn write_ufw_rule(out: &mut String, rule: &Rule, position: usize) {
        if let Some(field) = unsafe_field(rule) {
            tracing::warn!("Skipping rule #{position} in ufw script: invalid {field}");
            let _ = writeln!(out, "# Rule {position} skipped: invalid {field}");
            return;
        }

        let action = match rule.action {
            Action::Allow => "allow",
            Action::Deny => "deny",
            Action::Reject => "reject",
        };
        let direction = match rule.direction {
            Direction::Inbound => "in",
            Direction::Outbound => "out",
        };

        let _ = write!(out, "ufw {action} {direction}");
        if rule.protocol != Protocol::Any {
            let _ = write!(out, " proto {}", rule.protocol);
        }
        let _ = write!(out, " from {} to {}", rule.source_ip, rule.destination_ip);
        if !rule.any_port() {
            let _ = write!(out, " port {}", rule.port);
        }
        let _ = writeln!(out, " comment '{}'", rule_name(rule, position));
    }

    /// Generates a `netsh advfirewall` batch script for this ruleset.
    pub fn to_netsh_script(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "@echo off");
        let _ = writeln!(
            out,
            "REM Windows Firewall configuration generated by fwsim on {}",
            generated_at()
        );
        let _ = writeln!(out, "REM Run as Administrator\n");

        let _ = writeln!(out, "netsh advfirewall set allprofiles state on");
        let _ = writeln!(
            out,
            "netsh advfirewall set allprofiles firewallpolicy blockinbound,blockoutbound\n"
        );

        if !self.rules.is_empty() {
            let _ = writeln!(out, "REM --- Rules ---");
            let _ = writeln!(
                out,
                "REM Windows applies block rules before allow rules regardless of order"
            );
            for (i, rule) in self.rules.iter().enumerate() {
                Self::write_netsh_rule(&mut out, rule, i + 1);
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "echo Windows Firewall configuration completed!");
        let _ = writeln!(out, "pause");

        out
    }

    fn write_netsh_rule(out: &mut String, rule: &Rule, position: usize) {
        if let Some(field) = unsafe_field(rule) {
            tracing::warn!("Skipping rule #{position} in netsh script: invalid {field}");
            let _ = writeln!(out, "REM Rule {position} skipped: invalid {field}");
            return;
        }

        let name = rule_name(rule, position);

        let action = match rule.action {
            Action::Allow => "allow",
            Action::Deny => "block",
            Action::Reject => {
                let _ = writeln!(out, "REM \"{name}\": reject is not supported, using block");
                "block"
            }
        };

        // netsh addresses are from the host's point of view
        let (dir, local_ip, remote_ip, port_key) = match rule.direction {
            Direction::Inbound => ("in", &rule.destination_ip, &rule.source_ip, "localport"),
            Direction::Outbound => ("out", &rule.source_ip, &rule.destination_ip, "remoteport"),
        };

        // A port needs a concrete protocol; split "any" into TCP and UDP
        let protocols: &[(&str, &str)] = match (rule.protocol, rule.any_port()) {
            (Protocol::Tcp, _) => &[("TCP", "")],
            (Protocol::Udp, _) => &[("UDP", "")],
            (Protocol::Any, true) => &[("any", "")],
            (Protocol::Any, false) => &[("TCP", " (TCP)"), ("UDP", " (UDP)")],
        };

        for (protocol, suffix) in protocols {
            let _ = write!(
                out,
                "netsh advfirewall firewall add rule name=\"{name}{suffix}\" dir={dir} action={action} protocol={protocol}"
            );
            if !rule.any_port() {
                let _ = write!(out, " {port_key}={}", rule.port);
            }
            if *local_ip != WILDCARD {
                let _ = write!(out, " localip={local_ip}");
            }
            if *remote_ip != WILDCARD {
                let _ = write!(out, " remoteip={remote_ip}");
            }
            let _ = writeln!(out);
        }
    }
}
