//! Interactive rule-editing session
//!
//! A [`Session`] owns a working [`Ruleset`], its undo/redo history and the
//! current test packet. Input is one command per line; see [`HELP`]. Bad
//! input is reported and the session keeps going.

use std::fmt::{Display, Write as _};
use std::io::{BufRead, Write};
use std::str::FromStr;

use strum::IntoEnumIterator;

use crate::command::{AddRuleCommand, CommandHistory, DeleteRuleCommand, ReorderRuleCommand};
use crate::core::error::{Error, Result};
use crate::core::firewall::{Packet, RuleDraft, Ruleset};
use crate::core::matcher::MatchResult;
use crate::core::script::ScriptFormat;
use crate::validators::{
    check_well_known_port, validate_description, validate_ip, validate_packet_ip,
    validate_packet_port, validate_port,
};

pub const PROMPT: &str = "fwsim> ";

pub const HELP: &str = "\
Commands:
  list                                   Show rules in evaluation order
  add <action> <direction> <protocol> <port> <source> <destination> <description...>
                                         Append a rule (lowest priority)
  remove <n>                             Delete rule #n
  move <from> <to>                       Move rule #from to position #to
  packet                                 Show the test packet
  set <src|dst|port|protocol|direction> <value>
                                         Change one field of the test packet
  test [<src> <dst> <port> <protocol> <direction>]
                                         Run the test packet through the rules
  undo | redo                            Undo or redo the last edit
  render <ufw|netsh>                     Print the rules as a firewall script
  help                                   Show this help
  quit | exit                            Leave the session

Use \"any\" as port, source or destination to match everything.";

/// Outcome of one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text to show (may be empty)
    Output(String),
    Quit,
}

#[derive(Debug, Clone)]
pub struct Session {
    ruleset: Ruleset,
    history: CommandHistory,
    packet: Packet,
}

impl Session {
    pub fn new(ruleset: Ruleset) -> Self {
        Self {
            ruleset,
            history: CommandHistory::default(),
            packet: Packet::default(),
        }
    }

    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    /// Reads commands from `input` until `quit` or end of input.
    ///
    /// Command errors are written to `output` as `Error: ...` lines.
    ///
    /// # Errors
    ///
    /// Returns `Err` only if reading input or writing output fails.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> Result<()> {
        let mut line = String::new();
        loop {
            write!(output, "{PROMPT}")?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                writeln!(output)?;
                break;
            }

            match self.handle_line(&line) {
                Ok(Reply::Output(text)) => {
                    if !text.is_empty() {
                        writeln!(output, "{text}")?;
                    }
                }
                Ok(Reply::Quit) => break,
                Err(e) => {
                    tracing::debug!("Command failed: {e}");
                    writeln!(output, "Error: {e}")?;
                }
            }
        }
        Ok(())
    }

    /// Executes one command line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for unknown commands or bad arguments.
    pub fn handle_line(&mut self, line: &str) -> Result<Reply> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = words.split_first() else {
            return Ok(Reply::Output(String::new()));
        };

        let text = match command {
            "help" | "?" => HELP.to_string(),
            "list" | "ls" => self.list(),
            "add" => self.add(args)?,
            "remove" | "rm" => self.remove(args)?,
            "move" | "mv" => self.move_rule(args)?,
            "packet" => self.describe_packet(),
            "set" => self.set(args)?,
            "test" => self.test(args)?,
            "undo" => self
                .history
                .undo(&mut self.ruleset)
                .map_or_else(|| "Nothing to undo".to_string(), |d| format!("Undid: {d}")),
            "redo" => self
                .history
                .redo(&mut self.ruleset)
                .map_or_else(|| "Nothing to redo".to_string(), |d| format!("Redid: {d}")),
            "render" => self.render(args)?,
            "quit" | "exit" => return Ok(Reply::Quit),
            other => {
                return Err(Error::validation(
                    "command",
                    format!("unknown command \"{other}\" (type \"help\")"),
                ));
            }
        };

        Ok(Reply::Output(text))
    }

    fn list(&self) -> String {
        if self.ruleset.is_empty() {
            return "No rules; every packet is blocked by default".to_string();
        }

        let mut out = String::new();
        for (i, rule) in self.ruleset.rules.iter().enumerate() {
            let _ = writeln!(out, "#{} {rule}", i + 1);
        }
        out.truncate(out.trim_end().len());
        out
    }

    fn add(&mut self, args: &[&str]) -> Result<String> {
        let [action, direction, protocol, port, source, destination, description @ ..] = args
        else {
            return Err(usage(
                "add <action> <direction> <protocol> <port> <source> <destination> <description...>",
            ));
        };

        let draft = RuleDraft {
            action: parse_choice("action", action)?,
            direction: parse_choice("direction", direction)?,
            protocol: parse_choice("protocol", protocol)?,
            port: validate_port(port).map_err(|m| Error::validation("port", m))?,
            source_ip: validate_ip(source).map_err(|m| Error::validation("source", m))?,
            destination_ip: validate_ip(destination)
                .map_err(|m| Error::validation("destination", m))?,
            description: validate_description(&description.join(" "))
                .map_err(|m| Error::validation("description", m))?,
        };
        let rule = draft.into_rule()?;
        let text = format!("Added #{}: {rule}", self.ruleset.len() + 1);

        self.history
            .execute(Box::new(AddRuleCommand { rule }), &mut self.ruleset);
        Ok(text)
    }

    fn remove(&mut self, args: &[&str]) -> Result<String> {
        let [position] = args else {
            return Err(usage("remove <n>"));
        };
        let index = self.rule_index(position)?;

        let command = DeleteRuleCommand::at(&self.ruleset, index)
            .ok_or_else(|| Error::Internal(format!("rule #{position} vanished")))?;
        let text = format!("Removed #{position}: {}", command.rule);

        self.history.execute(Box::new(command), &mut self.ruleset);
        Ok(text)
    }

    fn move_rule(&mut self, args: &[&str]) -> Result<String> {
        let [from, to] = args else {
            return Err(usage("move <from> <to>"));
        };
        let old_index = self.rule_index(from)?;
        let new_index = self.rule_index(to)?;

        if old_index == new_index {
            return Ok(format!("Rule #{from} is already at position {to}"));
        }

        let command = ReorderRuleCommand {
            rule_id: self.ruleset.rules[old_index].id,
            old_index,
            new_index,
        };
        self.history.execute(Box::new(command), &mut self.ruleset);
        Ok(format!("Moved rule #{from} to position #{to}"))
    }

    fn describe_packet(&self) -> String {
        let mut text = format!("Packet: {}", self.packet);
        if let Some(service) = check_well_known_port(&self.packet.port) {
            let _ = write!(text, " ({service})");
        }
        text
    }

    fn set(&mut self, args: &[&str]) -> Result<String> {
        let [field, value] = args else {
            return Err(usage("set <src|dst|port|protocol|direction> <value>"));
        };

        match *field {
            "src" | "source" => self.packet.source_ip = packet_address("source", value)?,
            "dst" | "destination" => {
                self.packet.destination_ip = packet_address("destination", value)?;
            }
            "port" => self.packet.port = packet_port(value)?,
            "protocol" | "proto" => self.packet.protocol = parse_choice("protocol", value)?,
            "direction" | "dir" => self.packet.direction = parse_choice("direction", value)?,
            other => {
                return Err(Error::validation(
                    "field",
                    format!("unknown packet field \"{other}\" (src, dst, port, protocol, direction)"),
                ));
            }
        }

        Ok(self.describe_packet())
    }

    fn test(&mut self, args: &[&str]) -> Result<String> {
        match args {
            [] => {}
            [source, destination, port, protocol, direction] => {
                // Parse everything before touching the current packet
                self.packet = Packet::new(
                    packet_address("source", source)?,
                    packet_address("destination", destination)?,
                    packet_port(port)?,
                    parse_choice("protocol", protocol)?,
                    parse_choice("direction", direction)?,
                );
            }
            _ => return Err(usage("test [<src> <dst> <port> <protocol> <direction>]")),
        }

        let result = self.ruleset.evaluate(&self.packet);
        Ok(format!("{}\n{}", self.describe_packet(), describe_result(&result)))
    }

    fn render(&self, args: &[&str]) -> Result<String> {
        let [format] = args else {
            return Err(usage("render <ufw|netsh>"));
        };
        let format: ScriptFormat = parse_choice("format", format)?;
        Ok(self.ruleset.render(format).trim_end().to_string())
    }

    /// Converts a 1-based rule number into an index into the ruleset.
    fn rule_index(&self, position: &str) -> Result<usize> {
        let len = self.ruleset.len();
        match position.parse::<usize>() {
            Ok(n) if (1..=len).contains(&n) => Ok(n - 1),
            _ if len == 0 => Err(Error::validation("rule", "there are no rules")),
            _ => Err(Error::validation(
                "rule",
                format!("\"{position}\" is not a rule number (1-{len})"),
            )),
        }
    }
}

/// Formats a match result the way the session and `fwsim test` print it.
pub fn describe_result(result: &MatchResult<'_>) -> String {
    match (result.position, result.matched_rule) {
        (Some(position), Some(rule)) => {
            format!("{}\n  matched #{position}: {rule}", result.message)
        }
        _ => result.message.clone(),
    }
}

fn usage(text: &str) -> Error {
    Error::validation("usage", text)
}

/// Parses one of the values of a strum enum, listing the choices on failure.
fn parse_choice<T>(field: &str, value: &str) -> Result<T>
where
    T: FromStr + IntoEnumIterator + Display,
{
    value.parse().map_err(|_| {
        let choices: Vec<String> = T::iter().map(|v| v.to_string()).collect();
        Error::validation(
            field,
            format!("\"{value}\" is not one of: {}", choices.join(", ")),
        )
    })
}

fn packet_address(field: &str, value: &str) -> Result<String> {
    validate_packet_ip(value).map_err(|m| Error::validation(field, m))
}

fn packet_port(value: &str) -> Result<String> {
    validate_packet_port(value).map_err(|m| Error::validation("port", m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::firewall::{Action, Direction, PacketProtocol};

    fn output(session: &mut Session, line: &str) -> String {
        match session.handle_line(line).unwrap() {
            Reply::Output(text) => text,
            Reply::Quit => panic!("unexpected quit on {line:?}"),
        }
    }

    #[test]
    fn test_list_sample_rules() {
        let mut session = Session::new(Ruleset::sample());
        assert_eq!(
            output(&mut session, "list"),
            "#1 ALLOW inbound | TCP | Port: 22 | From: any | To: any - Allow SSH\n\
             #2 ALLOW inbound | TCP | Port: 80 | From: any | To: any - Allow HTTP\n\
             #3 DENY inbound | ANY | Port: any | From: any | To: any - Default deny all"
        );
    }

    #[test]
    fn test_list_empty() {
        let mut session = Session::new(Ruleset::new());
        assert!(output(&mut session, "list").contains("blocked by default"));
    }

    #[test]
    fn test_add_appends_rule() {
        let mut session = Session::new(Ruleset::sample());
        let text = output(
            &mut session,
            "add deny inbound udp 53 10.0.0.9 any Block rogue DNS",
        );

        assert!(text.starts_with("Added #4: DENY inbound | UDP | Port: 53"));
        let rule = &session.ruleset().rules[3];
        assert_eq!(rule.action, Action::Deny);
        assert_eq!(rule.source_ip, "10.0.0.9");
        assert_eq!(rule.description, "Block rogue DNS");
    }

    #[test]
    fn test_add_rejects_bad_fields() {
        let mut session = Session::new(Ruleset::new());

        for line in [
            "add drop inbound tcp 22 any any SSH",
            "add allow sideways tcp 22 any any SSH",
            "add allow inbound icmp 22 any any SSH",
            "add allow inbound tcp 99999 any any SSH",
            "add allow inbound tcp 22 10.0.0.0/8 any SSH",
            "add allow inbound tcp 22 any any",
        ] {
            assert!(session.handle_line(line).is_err(), "accepted {line:?}");
        }
        assert!(session.ruleset().is_empty());
    }

    #[test]
    fn test_error_lists_choices() {
        let mut session = Session::new(Ruleset::new());
        let err = session
            .handle_line("add drop inbound tcp 22 any any SSH")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error in action: \"drop\" is not one of: allow, deny, reject"
        );
    }

    #[test]
    fn test_remove_and_undo() {
        let mut session = Session::new(Ruleset::sample());
        output(&mut session, "remove 1");
        assert_eq!(session.ruleset().rules[0].description, "Allow HTTP");

        assert_eq!(output(&mut session, "undo"), "Undid: Delete rule: Allow SSH");
        assert_eq!(session.ruleset().rules[0].description, "Allow SSH");

        assert_eq!(output(&mut session, "redo"), "Redid: Delete rule: Allow SSH");
        assert_eq!(session.ruleset().len(), 2);
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut session = Session::new(Ruleset::sample());
        assert!(session.handle_line("remove 4").is_err());
        assert!(session.handle_line("remove 0").is_err());
        assert!(session.handle_line("remove x").is_err());
    }

    #[test]
    fn test_move_changes_decision() {
        let mut session = Session::new(Ruleset::sample());
        assert!(output(&mut session, "test").contains("ALLOWED"));

        output(&mut session, "move 3 1");
        assert_eq!(session.ruleset().rules[0].description, "Default deny all");
        assert!(output(&mut session, "test").contains("BLOCKED by rule: Default deny all"));
    }

    #[test]
    fn test_nothing_to_undo() {
        let mut session = Session::new(Ruleset::sample());
        assert_eq!(output(&mut session, "undo"), "Nothing to undo");
        assert_eq!(output(&mut session, "redo"), "Nothing to redo");
    }

    #[test]
    fn test_set_packet_fields() {
        let mut session = Session::new(Ruleset::sample());
        output(&mut session, "set port 22");
        output(&mut session, "set protocol udp");
        output(&mut session, "set dir outbound");
        output(&mut session, "set src 10.1.1.1");

        let packet = session.packet();
        assert_eq!(packet.port, "22");
        assert_eq!(packet.protocol, PacketProtocol::Udp);
        assert_eq!(packet.direction, Direction::Outbound);
        assert_eq!(packet.source_ip, "10.1.1.1");
    }

    #[test]
    fn test_packet_rejects_wildcards() {
        let mut session = Session::new(Ruleset::sample());
        assert!(session.handle_line("set port any").is_err());
        assert!(session.handle_line("set src any").is_err());
        assert_eq!(session.packet(), &Packet::default());
    }

    #[test]
    fn test_with_arguments_replaces_packet() {
        let mut session = Session::new(Ruleset::sample());
        let text = output(&mut session, "test 10.0.0.5 10.0.0.1 3389 tcp inbound");

        assert!(text.contains("BLOCKED by rule: Default deny all"));
        assert!(text.contains("matched #3"));
        assert_eq!(session.packet().port, "3389");
    }

    #[test]
    fn test_invalid_test_arguments_keep_packet() {
        let mut session = Session::new(Ruleset::sample());
        assert!(
            session
                .handle_line("test 10.0.0.5 10.0.0.1 22 sctp inbound")
                .is_err()
        );
        assert_eq!(session.packet(), &Packet::default());
    }

    #[test]
    fn test_default_deny_has_no_match_line() {
        let mut session = Session::new(Ruleset::new());
        let text = output(&mut session, "test");
        assert!(text.ends_with("Packet BLOCKED - No matching rule found (default deny)"));
        assert!(!text.contains("matched #"));
    }

    #[test]
    fn test_packet_shows_service() {
        let mut session = Session::new(Ruleset::new());
        assert_eq!(
            output(&mut session, "packet"),
            "Packet: inbound tcp 192.168.1.100 -> 192.168.1.1 port 80 (HTTP)"
        );
    }

    #[test]
    fn test_render() {
        let mut session = Session::new(Ruleset::sample());
        assert!(output(&mut session, "render ufw").starts_with("#!/bin/bash"));
        assert!(session.handle_line("render iptables").is_err());
    }

    #[test]
    fn test_unknown_command_and_quit() {
        let mut session = Session::new(Ruleset::new());
        assert!(session.handle_line("frobnicate").is_err());
        assert_eq!(output(&mut session, "   "), "");
        assert_eq!(session.handle_line("exit").unwrap(), Reply::Quit);
    }

    #[test]
    fn test_run_reports_errors_and_continues() {
        let mut session = Session::new(Ruleset::sample());
        let input = b"bogus\nremove 3\nlist\nquit\nlist\n";
        let mut out = Vec::new();

        session.run(&input[..], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Error: Validation error in command"));
        assert!(text.contains("#2 ALLOW inbound | TCP | Port: 80"));
        assert!(!text.contains("#3 DENY"));
        assert_eq!(session.ruleset().len(), 2);
    }

    #[test]
    fn test_run_stops_at_end_of_input() {
        let mut session = Session::new(Ruleset::new());
        let mut out = Vec::new();
        session.run(&b"list\n"[..], &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().ends_with(&format!("{PROMPT}\n")));
    }
}
