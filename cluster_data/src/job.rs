use chrono::NaiveDateTime;
use derive_more::derive::{Deref, Display, From, Into};
use tracing::debug;

use crate::misc::parsing::{count_or_zero, cpu_count, gpu_count};
use crate::schema::{JobField, Row};
use crate::slurm::{parse_job_start, NodeName, SlurmUser};

/// Index of a job within one [`crate::cluster::Cluster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
pub struct JobRef(pub usize);

/// squeue `%M`: `MM:SS`, `H:MM:SS`, `HH:MM:SS` or `D-HH:MM:SS`.
#[derive(Debug, Clone, PartialEq, Eq, Deref, Display, From, Into)]
pub struct Elapsed(pub String);

impl Elapsed {
    /// Whether the job has been running for two hours or more, judged by the length of the
    /// string alone: longer than `H:MM:SS` means at least ten hours, shorter means under one,
    /// and for exactly `H:MM:SS` only a leading `1` is short.
    ///
    /// `1-02:00:00` is therefore counted as long and `1:59:59` as short. This is the rule the
    /// dashboard has always used, keep it in sync with the legend on the page.
    pub fn is_long(&self) -> bool {
        const H_MM_SS: usize = "H:MM:SS".len();
        match self.len().cmp(&H_MM_SS) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => !self.starts_with('1'),
        }
    }
}

/// Everything needed to create a [`Job`], as read from one queue line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub id: String,
    pub user: SlurmUser,
    pub node: NodeName,
    pub gpus: usize,
    pub cpus: usize,
    pub elapsed: Elapsed,
    pub started: NaiveDateTime,
    pub command: String,
}

impl JobSpec {
    /// `None` for jobs that have not been given a node yet. An unreadable start time becomes
    /// `now`, unreadable counts become 0.
    pub fn from_row(row: &Row<'_, JobField>, now: NaiveDateTime) -> Option<Self> {
        let node = row.get(JobField::NodeList).trim();
        if node.is_empty() {
            return None;
        }

        let start = row.get(JobField::StartTime);
        let started = parse_job_start(start).unwrap_or_else(|e| {
            debug!(start, "unreadable job start time ({e}), using current time");
            now
        });

        Some(Self {
            id: row.get(JobField::JobId).trim().to_owned(),
            user: SlurmUser::from(row.get(JobField::User).trim()),
            node: NodeName::from(node),
            gpus: count_or_zero(gpu_count(row.get(JobField::TresPerNode)), "job gpus"),
            cpus: count_or_zero(cpu_count(row.get(JobField::Cpus)), "job cpus"),
            elapsed: Elapsed(row.get(JobField::Elapsed).trim().to_owned()),
            started,
            command: row.get(JobField::Command).trim().to_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub user: SlurmUser,
    pub node: NodeName,
    pub gpus: usize,
    pub cpus: usize,
    pub elapsed: Elapsed,
    pub started: NaiveDateTime,
    pub command: String,
    pub interactive: bool,
}

impl Job {
    pub fn new(spec: JobSpec, interactive: bool) -> Self {
        let JobSpec {
            id,
            user,
            node,
            gpus,
            cpus,
            elapsed,
            started,
            command,
        } = spec;
        Self {
            id,
            user,
            node,
            gpus,
            cpus,
            elapsed,
            started,
            command,
            interactive,
        }
    }

    pub fn is_long_interactive(&self) -> bool {
        self.interactive && self.elapsed.is_long()
    }
}

/// How a job is highlighted on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Normal,
    Overusing,
    LongInteractive,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Overusing => "overusing",
            Self::LongInteractive => "long-interactive",
        }
    }
}
