//! Column layouts of the scheduler queries.
//!
//! The order of the columns differs between the sinfo/squeue invocations we have seen, so it
//! is configured rather than assumed. The query command is generated from the same [`Schema`]
//! that later splits the output, which keeps both sides in sync.

use std::fmt::Debug;
use std::hash::Hash;

use itertools::Itertools as _;
use serde::Deserialize;
use thiserror::Error;

pub trait Field: Copy + Eq + Hash + Debug + 'static {
    /// Scheduler tool producing rows of this kind.
    const TOOL: &'static str;
    /// Every field, in the default column order.
    const ALL: &'static [Self];

    /// Format specifier understood by [`Self::TOOL`]'s `-o` option.
    fn specifier(self) -> &'static str;
}

/// Columns of the node inventory (`sinfo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeField {
    NodeList,
    Gres,
    Cpus,
    State,
    Features,
    Reason,
}

impl Field for NodeField {
    const TOOL: &'static str = "sinfo";
    const ALL: &'static [Self] = &[
        Self::NodeList,
        Self::Gres,
        Self::Cpus,
        Self::State,
        Self::Features,
        Self::Reason,
    ];

    fn specifier(self) -> &'static str {
        match self {
            Self::NodeList => "%N",
            Self::Gres => "%G",
            Self::Cpus => "%c",
            Self::State => "%t",
            Self::Features => "%f",
            Self::Reason => "%E",
        }
    }
}

/// Columns of the active job listing (`squeue`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobField {
    User,
    TresPerNode,
    Cpus,
    NodeList,
    Elapsed,
    JobId,
    StartTime,
    Command,
}

impl Field for JobField {
    const TOOL: &'static str = "squeue";
    const ALL: &'static [Self] = &[
        Self::User,
        Self::TresPerNode,
        Self::Cpus,
        Self::NodeList,
        Self::Elapsed,
        Self::JobId,
        Self::StartTime,
        Self::Command,
    ];

    fn specifier(self) -> &'static str {
        match self {
            Self::User => "%u",
            Self::TresPerNode => "%b",
            Self::Cpus => "%C",
            Self::NodeList => "%N",
            Self::Elapsed => "%M",
            Self::JobId => "%i",
            Self::StartTime => "%S",
            Self::Command => "%o",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("field `{0}` is missing from the schema")]
    Missing(String),
    #[error("field `{0}` appears more than once in the schema")]
    Duplicate(String),
    #[error("expected {expected} tab separated fields, got {got}")]
    FieldCount { expected: usize, got: usize },
}

/// An ordered permutation of all fields of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema<F: Field> {
    fields: Vec<F>,
}

impl<F: Field> Schema<F> {
    pub fn new(fields: Vec<F>) -> Result<Self, SchemaError> {
        if let Some(duplicate) = fields.iter().duplicates().next() {
            return Err(SchemaError::Duplicate(format!("{duplicate:?}")));
        }
        if let Some(missing) = F::ALL.iter().find(|field| !fields.contains(field)) {
            return Err(SchemaError::Missing(format!("{missing:?}")));
        }
        Ok(Self { fields })
    }

    /// `-o` argument, fields separated by TAB.
    pub fn format(&self) -> String {
        self.fields.iter().map(|field| field.specifier()).join("\t")
    }

    /// Full shell command, without header line.
    pub fn command(&self) -> String {
        format!("{tool} -h -o \"{format}\"", tool = F::TOOL, format = self.format())
    }

    /// Split one output line. The last column takes the rest of the line, tabs included.
    pub fn split<'a>(&'a self, line: &'a str) -> Result<Row<'a, F>, SchemaError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let values = line.splitn(self.fields.len(), '\t').collect_vec();
        if values.len() != self.fields.len() {
            return Err(SchemaError::FieldCount {
                expected: self.fields.len(),
                got: values.len(),
            });
        }
        Ok(Row {
            fields: &self.fields,
            values,
        })
    }
}

impl<F: Field> Default for Schema<F> {
    fn default() -> Self {
        Self {
            fields: F::ALL.to_vec(),
        }
    }
}

/// One split output line, addressed by field.
#[derive(Debug, Clone)]
pub struct Row<'a, F: Field> {
    fields: &'a [F],
    values: Vec<&'a str>,
}

impl<'a, F: Field> Row<'a, F> {
    pub fn get(&self, field: F) -> &'a str {
        self.fields
            .iter()
            .position(|f| *f == field)
            .and_then(|i| self.values.get(i).copied())
            .unwrap_or_default()
    }
}
