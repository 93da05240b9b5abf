//! One run's view of the cluster: nodes, users and jobs, cross-referenced.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;
use itertools::Itertools as _;
use tracing::{debug, info, instrument, warn};

use crate::job::{Job, JobRef, JobSpec, Severity};
use crate::node::{Node, NodeSpec};
use crate::schema::{JobField, Schema};
use crate::session::Session;
use crate::slurm::{NodeName, SlurmUser};
use crate::user::User;
use crate::{DEFAULT_GPU_QUOTA, DEFAULT_INTERACTIVE_COMMAND, DEFAULT_NODE_PREFIX};

/// Site specific knobs of the aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRules {
    pub gpu_quota: usize,
    /// nodes named `<prefix><number>` are ordered by number, all others go last
    pub node_prefix: String,
    /// job command marking an interactive shell
    pub interactive_command: String,
}

impl Default for ClusterRules {
    fn default() -> Self {
        Self {
            gpu_quota: DEFAULT_GPU_QUOTA,
            node_prefix: DEFAULT_NODE_PREFIX.to_owned(),
            interactive_command: DEFAULT_INTERACTIVE_COMMAND.to_owned(),
        }
    }
}

impl ClusterRules {
    fn node_number(&self, name: &NodeName) -> u64 {
        name.strip_prefix(self.node_prefix.as_str())
            .and_then(|number| number.parse().ok())
            .unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// GPUs on available nodes
    pub total_gpus: usize,
    /// GPUs in use on available nodes
    pub total_used: usize,
    /// whole percent, 0 without any available GPU
    pub usage_rate: u32,
}

impl Summary {
    pub fn new(total_gpus: usize, total_used: usize) -> Self {
        let usage_rate = if total_gpus == 0 {
            0
        } else {
            // ties to even, like the percentages the dashboard has always shown
            (100.0 * total_used as f64 / total_gpus as f64).round_ties_even() as u32
        };
        Self {
            total_gpus,
            total_used,
            usage_rate,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Cluster {
    rules: ClusterRules,
    nodes: BTreeMap<NodeName, Node>,
    users: BTreeMap<SlurmUser, User>,
    jobs: Vec<Job>,
}

impl Cluster {
    pub fn new(rules: ClusterRules, nodes: BTreeMap<NodeName, Node>) -> Self {
        Self {
            rules,
            nodes,
            users: BTreeMap::new(),
            jobs: Vec::new(),
        }
    }

    /// Read the job queue. Lines with the wrong number of fields are skipped, unallocated
    /// jobs are ignored.
    #[instrument(skip_all)]
    pub fn read_jobs<I>(
        &mut self,
        lines: I,
        schema: &Schema<JobField>,
        sessions: &HashSet<Session>,
        now: NaiveDateTime,
    ) where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for (i, line) in lines.into_iter().enumerate() {
            let line = line.as_ref();
            if line.trim().is_empty() {
                continue;
            }
            let row = match schema.split(line) {
                Ok(row) => row,
                Err(e) => {
                    warn!(line = i, "skipping job line: {e}");
                    continue;
                }
            };
            match JobSpec::from_row(&row, now) {
                Some(spec) => {
                    self.add_job(spec, sessions);
                }
                None => debug!(line = i, "job not allocated to a node yet"),
            }
        }
        info!(jobs = self.jobs.len(), users = self.users.len(), "parsed job queue");
    }

    /// Register a job with its node and user, creating either if needed.
    pub fn add_job(&mut self, spec: JobSpec, sessions: &HashSet<Session>) -> JobRef {
        let interactive = spec.command == self.rules.interactive_command
            && sessions.contains(&Session {
                user: spec.user.clone(),
                started: spec.started,
            });
        let job = Job::new(spec, interactive);
        let job_ref = JobRef(self.jobs.len());

        self.nodes
            .entry(job.node.clone())
            .or_insert_with(|| {
                debug!(node = %job.node, "node missing from inventory, adding placeholder");
                Node::new(NodeSpec::placeholder(job.node.clone()))
            })
            .add_job(job_ref, job.gpus);
        let quota = self.rules.gpu_quota;
        self.users
            .entry(job.user.clone())
            .or_insert_with(|| User::new(job.user.clone(), quota))
            .add_job(job_ref, job.gpus);

        self.jobs.push(job);
        job_ref
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn user(&self, name: &str) -> Option<&User> {
        self.users.get(name)
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job(&self, job: JobRef) -> Option<&Job> {
        self.jobs.get(job.0)
    }

    /// Nodes with GPUs, available ones first, then by number.
    pub fn display_nodes(&self) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|node| node.gpus > 0)
            .sorted_by_key(|&node| (!node.is_up(), self.rules.node_number(&node.name), &node.name))
            .collect_vec()
    }

    pub fn summary(&self) -> Summary {
        let (total_gpus, total_used) = self
            .nodes
            .values()
            .filter(|node| node.is_up())
            .fold((0, 0), |(gpus, used), node| (gpus + node.gpus, used + node.gpu_used()));
        Summary::new(total_gpus, total_used)
    }

    pub fn is_overusing(&self, user: &SlurmUser) -> bool {
        self.users.get(user).is_some_and(User::is_overusing)
    }

    pub fn severity(&self, job: &Job) -> Severity {
        if job.is_long_interactive() {
            Severity::LongInteractive
        } else if self.is_overusing(&job.user) {
            Severity::Overusing
        } else {
            Severity::Normal
        }
    }

    pub fn job_tooltip(&self, job: &Job) -> String {
        let mut tooltip = format!(
            "{user}: {gpus} GPU, {cpus} CPU, running for {elapsed} (job {id})",
            user = job.user,
            gpus = job.gpus,
            cpus = job.cpus,
            elapsed = job.elapsed,
            id = job.id,
        );
        if job.is_long_interactive() {
            tooltip.push_str(" - interactive session open for 2 hours or more");
        } else if job.interactive {
            tooltip.push_str(" - interactive session");
        }
        if self.is_overusing(&job.user) {
            tooltip.push_str(" - user is over the GPU quota");
        }
        tooltip
    }
}
