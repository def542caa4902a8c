//! Defines the `ReverseRule` struct and the parsing of rule-table lines.

use std::collections::HashMap;
use thiserror::Error;

use crate::utils::split_rule_fields;

/// A single reverse-romanization rule: Latin `source` text mapped to `target`
/// text of one script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseRule {
    pub source: String,
    pub target: String,
    pub script: String,
    /// Higher wins among rules sharing `source` and `script`.
    pub priority: i32,
    /// Name of the table the rule came from, e.g. `arabic`.
    pub prov: String,
    /// Global load sequence number; breaks priority ties (lower wins).
    pub order: usize,
}

/// Why a data line of a rule table was not turned into a rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleLineError {
    #[error("expected at least 3 '::'-separated fields, found {0}")]
    TooFewFields(usize),

    #[error("empty source pattern")]
    EmptySource,

    #[error("invalid priority '{0}'")]
    InvalidPriority(String),
}

impl ReverseRule {
    /// Parses one data line: `source::target::script[::priority[::context]]`.
    ///
    /// Comment and blank lines must be filtered out by the caller. Source and
    /// target are kept exactly as written; no Unicode normalization is applied,
    /// so a span matches only the identical code point sequence.
    pub fn from_line(line: &str, provenance: &str, order: usize) -> Result<Self, RuleLineError> {
        let fields = split_rule_fields(line);
        if fields.len() < 3 {
            return Err(RuleLineError::TooFewFields(fields.len()));
        }

        let source = fields[0].to_string();
        if source.is_empty() {
            return Err(RuleLineError::EmptySource);
        }
        let target = fields[1].to_string();
        let script = fields[2].to_string();

        // The fifth field (context) is reserved and ignored.
        let priority = match fields.get(3) {
            Some(p) if !p.is_empty() => p
                .parse::<i32>()
                .map_err(|_| RuleLineError::InvalidPriority(p.to_string()))?,
            _ => 0,
        };

        Ok(Self {
            source,
            target,
            script,
            priority,
            prov: provenance.to_string(),
            order,
        })
    }

    /// Orders two candidate rules for the same span: higher priority first,
    /// then earlier load order.
    pub(crate) fn outranks(&self, other: &ReverseRule) -> bool {
        (self.priority, std::cmp::Reverse(self.order))
            > (other.priority, std::cmp::Reverse(other.order))
    }
}

/// All rules, grouped by their exact source text, in load order.
pub type ReverseRules = HashMap<String, Vec<ReverseRule>>;
