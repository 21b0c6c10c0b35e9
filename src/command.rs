//! Command pattern implementation for undo/redo of ruleset edits
//!
//! Rules themselves are immutable. Every change to a [`Ruleset`] is one of
//! three whole-rule operations, each encapsulated as a [`Command`]:
//! - [`AddRuleCommand`]: appends a rule (lowest priority)
//! - [`DeleteRuleCommand`]: removes a rule, remembering where it was
//! - [`ReorderRuleCommand`]: moves a rule to another position
//!
//! "Editing" a rule is a delete followed by an add. The [`CommandHistory`]
//! manages the undo/redo stacks with configurable depth.
//!
//! # Example
//!
//! ```
//! use fwsim::command::{AddRuleCommand, CommandHistory};
//! use fwsim::core::firewall::{RuleDraft, Ruleset};
//!
//! let mut ruleset = Ruleset::new();
//! let mut history = CommandHistory::default();
//!
//! let rule = RuleDraft {
//!     port: "80".to_string(),
//!     description: "Allow HTTP".to_string(),
//!     ..RuleDraft::default()
//! }
//! .into_rule()
//! .unwrap();
//!
//! history.execute(Box::new(AddRuleCommand { rule }), &mut ruleset);
//! assert_eq!(ruleset.len(), 1);
//!
//! history.undo(&mut ruleset);
//! assert!(ruleset.is_empty());
//! ```

use crate::core::firewall::{Rule, Ruleset};
use uuid::Uuid;

/// Command pattern trait for undo/redo functionality
///
/// Each command encapsulates a state change operation and knows how to undo it.
pub trait Command: std::fmt::Debug + Send {
    /// Executes the command, applying changes to the ruleset
    fn execute(&self, ruleset: &mut Ruleset);

    /// Undoes the command, reverting changes to the ruleset
    fn undo(&self, ruleset: &mut Ruleset);

    /// Returns a human-readable description of this command
    fn description(&self) -> String;

    /// Clones the command into a boxed trait object
    fn box_clone(&self) -> Box<dyn Command>;
}

impl Clone for Box<dyn Command> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Appends a new rule to the end of the ruleset
#[derive(Debug, Clone)]
pub struct AddRuleCommand {
    pub rule: Rule,
}

impl Command for AddRuleCommand {
    fn execute(&self, ruleset: &mut Ruleset) {
        ruleset.rules.push(self.rule.clone());
    }

    fn undo(&self, ruleset: &mut Ruleset) {
        ruleset.rules.retain(|r| r.id != self.rule.id);
    }

    fn description(&self) -> String {
        format!("Add rule: {}", self.rule.description)
    }

    fn box_clone(&self) -> Box<dyn Command> {
        Box::new(self.clone())
    }
}

/// Removes an existing rule from the ruleset
#[derive(Debug, Clone)]
pub struct DeleteRuleCommand {
    pub rule: Rule,
    pub index: usize,
}

impl DeleteRuleCommand {
    /// Captures the rule at `index`, or `None` if out of bounds.
    pub fn at(ruleset: &Ruleset, index: usize) -> Option<Self> {
        ruleset.rules.get(index).map(|rule| Self {
            rule: rule.clone(),
            index,
        })
    }
}

impl Command for DeleteRuleCommand {
    fn execute(&self, ruleset: &mut Ruleset) {
        ruleset.rules.retain(|r| r.id != self.rule.id);
    }

    fn undo(&self, ruleset: &mut Ruleset) {
        // Insert at original index to preserve order
        if self.index <= ruleset.rules.len() {
            ruleset.rules.insert(self.index, self.rule.clone());
        } else {
            ruleset.rules.push(self.rule.clone());
        }
    }

    fn description(&self) -> String {
        format!("Delete rule: {}", self.rule.description)
    }

    fn box_clone(&self) -> Box<dyn Command> {
        Box::new(self.clone())
    }
}

/// Moves a rule from one position to another
#[derive(Debug, Clone)]
pub struct ReorderRuleCommand {
    pub rule_id: Uuid,
    pub old_index: usize,
    pub new_index: usize,
}

impl Command for ReorderRuleCommand {
    fn execute(&self, ruleset: &mut Ruleset) {
        if let Some(pos) = ruleset.position(self.rule_id) {
            let rule = ruleset.rules.remove(pos);
            let insert_pos = self.new_index.min(ruleset.rules.len());
            ruleset.rules.insert(insert_pos, rule);
        }
    }

    fn undo(&self, ruleset: &mut Ruleset) {
        if let Some(pos) = ruleset.position(self.rule_id) {
            let rule = ruleset.rules.remove(pos);
            let insert_pos = self.old_index.min(ruleset.rules.len());
            ruleset.rules.insert(insert_pos, rule);
        }
    }

    fn description(&self) -> String {
        format!(
            "Move rule (position {} -> {})",
            self.old_index + 1,
            self.new_index + 1
        )
    }

    fn box_clone(&self) -> Box<dyn Command> {
        Box::new(self.clone())
    }
}

/// Manages the undo/redo history
#[derive(Debug, Clone)]
pub struct CommandHistory {
    undo_stack: Vec<Box<dyn Command>>,
    redo_stack: Vec<Box<dyn Command>>,
    max_history: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(20)
    }
}

impl CommandHistory {
    /// Creates a new command history with the specified maximum size
    pub fn new(max_history: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_history,
        }
    }

    /// Executes a command and adds it to the undo stack
    pub fn execute(&mut self, command: Box<dyn Command>, ruleset: &mut Ruleset) {
        command.execute(ruleset);
        tracing::debug!("Executed: {}", command.description());

        // New edits invalidate anything that was undone
        self.redo_stack.clear();

        self.undo_stack.push(command);

        if self.undo_stack.len() > self.max_history {
            self.undo_stack.remove(0);
        }
    }

    /// Undoes the last command
    pub fn undo(&mut self, ruleset: &mut Ruleset) -> Option<String> {
        let command = self.undo_stack.pop()?;
        let description = command.description();
        command.undo(ruleset);
        tracing::info!("Undid: {}", description);
        self.redo_stack.push(command);
        Some(description)
    }

    /// Redoes the last undone command
    pub fn redo(&mut self, ruleset: &mut Ruleset) -> Option<String> {
        let command = self.redo_stack.pop()?;
        let description = command.description();
        command.execute(ruleset);
        tracing::info!("Redid: {}", description);
        self.undo_stack.push(command);
        Some(description)
    }
}
