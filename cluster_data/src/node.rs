use std::collections::BTreeMap;

use tracing::{debug, info, instrument, warn};

use crate::job::JobRef;
use crate::misc::parsing::{count_or_zero, cpu_count, gpu_count};
use crate::nodelist;
use crate::schema::{NodeField, Row, Schema};
use crate::slurm::NodeName;

/// sinfo `%t` states that count as available. Matched exactly, so flagged states such as
/// `idle*` (not responding) are unavailable.
pub const UP_STATES: [&str; 2] = ["mix", "idle"];

/// Node type shown when sinfo gave none, or for nodes only known from the job queue.
pub const UNKNOWN_KIND: &str = "?";

/// Suffix characters slurm appends to `%t` to flag a state.
const STATE_FLAGS: [char; 9] = ['*', '~', '#', '!', '%', '$', '@', '^', '-'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    Up,
    Down,
    Draining,
    Unknown,
}

impl NodeState {
    pub fn from_slurm(state: &str) -> Self {
        let state = state.trim();
        if UP_STATES.contains(&state) {
            return Self::Up;
        }
        match state.trim_end_matches(STATE_FLAGS) {
            "down" => Self::Down,
            "drain" | "drng" | "drained" | "draining" => Self::Draining,
            _ => Self::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Draining => "draining",
            Self::Unknown => "unknown",
        }
    }
}

/// Everything needed to create a [`Node`]. Defaults are the parser's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub name: NodeName,
    pub gpus: usize,
    pub cpus: usize,
    pub kind: String,
    /// state as reported by slurm, e.g. `mix` or `drain*`
    pub state: String,
    pub message: String,
}

impl NodeSpec {
    /// A node referenced by a job but missing from the inventory.
    pub fn placeholder(name: NodeName) -> Self {
        Self {
            name,
            gpus: 0,
            cpus: 0,
            kind: UNKNOWN_KIND.to_owned(),
            state: String::new(),
            message: String::new(),
        }
    }

    /// One spec per node named by the row's hostlist column.
    pub fn expand_row(row: &Row<'_, NodeField>) -> Vec<Self> {
        let gpus = count_or_zero(gpu_count(row.get(NodeField::Gres)), "node gpus");
        let cpus = count_or_zero(cpu_count(row.get(NodeField::Cpus)), "node cpus");
        let kind = match row.get(NodeField::Features).trim() {
            "" | "(null)" => UNKNOWN_KIND,
            kind => kind,
        };
        let state = row.get(NodeField::State).trim();
        let message = row.get(NodeField::Reason).trim();

        nodelist::expand_list(row.get(NodeField::NodeList).trim())
            .into_iter()
            .map(|name| Self {
                name: NodeName(name),
                gpus,
                cpus,
                kind: kind.to_owned(),
                state: state.to_owned(),
                message: message.to_owned(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: NodeName,
    pub gpus: usize,
    pub cpus: usize,
    pub kind: String,
    pub raw_state: String,
    pub state: NodeState,
    pub message: String,
    gpu_jobs: Vec<JobRef>,
    cpu_jobs: Vec<JobRef>,
}

impl Node {
    pub fn new(spec: NodeSpec) -> Self {
        let NodeSpec {
            name,
            gpus,
            cpus,
            kind,
            state,
            message,
        } = spec;
        Self {
            name,
            gpus,
            cpus,
            kind,
            state: NodeState::from_slurm(&state),
            raw_state: state,
            message,
            gpu_jobs: Vec::new(),
            cpu_jobs: Vec::new(),
        }
    }

    /// GPU jobs are added once per GPU they use, so the list maps 1:1 to occupied GPUs.
    pub fn add_job(&mut self, job: JobRef, gpus: usize) {
        if gpus > 0 {
            self.gpu_jobs.extend(std::iter::repeat(job).take(gpus));
        } else {
            self.cpu_jobs.push(job);
        }
    }

    pub fn gpu_jobs(&self) -> &[JobRef] {
        &self.gpu_jobs
    }

    pub fn cpu_jobs(&self) -> &[JobRef] {
        &self.cpu_jobs
    }

    pub fn gpu_used(&self) -> usize {
        self.gpu_jobs.len()
    }

    pub fn gpu_free(&self) -> usize {
        self.gpus.saturating_sub(self.gpu_used())
    }

    pub fn is_full(&self) -> bool {
        self.gpu_used() >= self.gpus
    }

    pub fn is_up(&self) -> bool {
        self.state == NodeState::Up
    }
}

/// Parse the node inventory. A node listed twice keeps its last record.
#[instrument(skip_all)]
pub fn parse_inventory<I>(lines: I, schema: &Schema<NodeField>) -> BTreeMap<NodeName, Node>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut nodes = BTreeMap::new();
    for (i, line) in lines.into_iter().enumerate() {
        let line = line.as_ref();
        if line.trim().is_empty() {
            continue;
        }
        let row = match schema.split(line) {
            Ok(row) => row,
            Err(e) => {
                warn!(line = i, "skipping inventory line: {e}");
                continue;
            }
        };
        for spec in NodeSpec::expand_row(&row) {
            if let Some(previous) = nodes.insert(spec.name.clone(), Node::new(spec)) {
                debug!(node = %previous.name, "node listed more than once, keeping the last record");
            }
        }
    }
    info!(nodes = nodes.len(), "parsed node inventory");
    nodes
}
