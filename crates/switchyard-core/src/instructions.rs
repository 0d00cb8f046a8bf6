//! Instruction map — the specialist agents a query can be routed to
//!
//! Each entry pairs a routing key with the system prompt used when a query is
//! executed under that key. The map is loaded once at startup, validated, and
//! never mutated afterwards. Entry order is preserved and is the order keys
//! are offered to the router.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::InstructionError;

const BUILTIN_INSTRUCTIONS: &str = include_str!("../../../config/instructions.toml");

/// One specialist agent: its routing key and instruction text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInstruction {
    pub key: String,
    pub instruction: String,
}

impl AgentInstruction {
    pub fn new(key: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            instruction: instruction.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InstructionFile {
    #[serde(default)]
    agent: Vec<AgentInstruction>,
}

/// Ordered, read-only mapping from agent key to instruction text
#[derive(Debug, Clone)]
pub struct InstructionMap {
    entries: Vec<AgentInstruction>,
}

impl InstructionMap {
    /// The instruction set shipped with the binary
    pub fn builtin() -> Result<Self, InstructionError> {
        Self::from_toml_str(BUILTIN_INSTRUCTIONS)
    }

    /// Load an instruction file from disk
    pub fn load(path: &Path) -> Result<Self, InstructionError> {
        let content = std::fs::read_to_string(path).map_err(|source| InstructionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let map = Self::from_toml_str(&content)?;
        debug!(
            "Loaded {} instructions from {}",
            map.len(),
            path.display()
        );
        Ok(map)
    }

    /// Parse a TOML document made of `[[agent]]` tables
    pub fn from_toml_str(content: &str) -> Result<Self, InstructionError> {
        let file: InstructionFile = toml::from_str(content)?;
        Self::from_entries(file.agent)
    }

    /// Build a map from entries, trimming instruction text and rejecting
    /// empty, malformed or duplicate keys
    pub fn from_entries(entries: Vec<AgentInstruction>) -> Result<Self, InstructionError> {
        if entries.is_empty() {
            return Err(InstructionError::Empty);
        }

        let mut seen = HashSet::new();
        let mut validated = Vec::with_capacity(entries.len());
        for entry in entries {
            if !is_valid_key(&entry.key) {
                return Err(InstructionError::InvalidKey(entry.key));
            }
            if !seen.insert(entry.key.clone()) {
                return Err(InstructionError::DuplicateKey(entry.key));
            }
            let instruction = entry.instruction.trim();
            if instruction.is_empty() {
                return Err(InstructionError::EmptyInstruction(entry.key));
            }
            validated.push(AgentInstruction {
                instruction: instruction.to_string(),
                key: entry.key,
            });
        }

        Ok(Self { entries: validated })
    }

    /// Instruction text for a key (exact, case-sensitive match)
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.instruction.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Fail unless `key` is present
    pub fn require(&self, key: &str) -> Result<(), InstructionError> {
        if self.contains(key) {
            Ok(())
        } else {
            Err(InstructionError::MissingKey(key.to_string()))
        }
    }

    /// Keys in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentInstruction> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '`'))
}
