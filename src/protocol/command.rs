//! Remote command list
//!
//! Devices advertise the commands they accept with a `|name1|name2|` line.
//! Names starting with `_` are internal and never listed.

use serde::Serialize;
use std::collections::HashSet;

/// Request asking a device to (re)send its command list
pub const LIST_COMMANDS_REQUEST: &str = "|_telecmd_list_cmd|";

/// Names announced by a command-list line, in order
pub fn parse_command_list(line: &str) -> impl Iterator<Item = &str> {
    line.split('|')
        .filter(|name| !name.is_empty() && !name.starts_with('_'))
}

/// Wire form of a command invocation
pub fn encode_command(name: &str) -> String {
    format!("|{}|", name)
}

/// Known remote commands, unique by name, in discovery order
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandSet {
    names: Vec<String>,
    #[serde(skip)]
    index: HashSet<String>,
}

impl CommandSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a name, returning false if it was already known
    pub fn insert(&mut self, name: &str) -> bool {
        if !self.index.insert(name.to_string()) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    /// Merge a command-list line, returning the number of new commands
    pub fn merge_line(&mut self, line: &str) -> usize {
        parse_command_list(line)
            .filter(|name| self.insert(name))
            .count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains(name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
