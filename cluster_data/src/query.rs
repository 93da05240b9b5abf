//! Running the scheduler queries on the cluster head nodes.

use std::collections::HashSet;
use std::io::{BufRead, BufReader, Lines};
use std::iter;
use std::process::{Child, ChildStdout, Command, Stdio};

use chrono::NaiveDateTime;
use color_eyre::eyre::{eyre, Context as _};
use color_eyre::Result;
use tracing::{debug, info, instrument, warn};

use crate::cluster::{Cluster, ClusterRules};
use crate::node::parse_inventory;
use crate::schema::{JobField, NodeField, Schema};
use crate::session::{self, parse_sessions, Session};
use crate::{DEFAULT_SSH_OPTIONS, DEFAULT_SSH_PROGRAM};

pub type OutputLines = Box<dyn Iterator<Item = String>>;

/// Transport executing a shell command on a remote host.
pub trait RemoteShell {
    /// Start `command` on `host`. The returned lines are read lazily.
    fn exec(&self, host: &str, command: &str) -> Result<OutputLines>;
}

/// `ssh <options> <host> <command>`, blocking until the remote side is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshShell {
    pub program: String,
    pub options: Vec<String>,
}

impl Default for SshShell {
    fn default() -> Self {
        Self {
            program: DEFAULT_SSH_PROGRAM.to_owned(),
            options: DEFAULT_SSH_OPTIONS.map(str::to_owned).to_vec(),
        }
    }
}

impl RemoteShell for SshShell {
    fn exec(&self, host: &str, command: &str) -> Result<OutputLines> {
        debug!(host, command, "spawning {}", self.program);
        let mut child = Command::new(&self.program)
            .args(&self.options)
            .arg(host)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .wrap_err_with(|| format!("spawning `{}` for {host}", self.program))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| eyre!("no stdout handle for `{}`", self.program))?;

        Ok(Box::new(ChildLines {
            host: host.to_owned(),
            lines: Some(BufReader::new(stdout).lines()),
            child,
        }))
    }
}

/// Output lines of a spawned child, reaped when dropped.
struct ChildLines {
    host: String,
    lines: Option<Lines<BufReader<ChildStdout>>>,
    child: Child,
}

impl Iterator for ChildLines {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        match self.lines.as_mut()?.next()? {
            Ok(line) => Some(line),
            Err(e) => {
                warn!(host = %self.host, "reading remote output failed: {e}");
                self.lines = None;
                None
            }
        }
    }
}

impl Drop for ChildLines {
    fn drop(&mut self) {
        // close our end first so a child blocked on a full pipe can exit
        self.lines = None;
        match self.child.wait() {
            Ok(status) if !status.success() => {
                warn!(host = %self.host, %status, "remote command failed")
            }
            Ok(_) => {}
            Err(e) => warn!(host = %self.host, "waiting for remote command: {e}"),
        }
    }
}

/// Run `command` on every host in order and chain the outputs. A host that cannot be reached
/// contributes whatever it printed, possibly nothing.
pub fn query_cluster<'a, S>(shell: &'a S, command: &'a str, hosts: &'a [String]) -> impl Iterator<Item = String> + 'a
where
    S: RemoteShell + ?Sized,
{
    hosts.iter().flat_map(move |host| -> OutputLines {
        match shell.exec(host, command) {
            Ok(lines) => lines,
            Err(e) => {
                warn!(%host, "querying host failed: {e:#}");
                Box::new(iter::empty())
            }
        }
    })
}

/// Everything that is asked of the head nodes in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterQuery {
    pub hosts: Vec<String>,
    pub node_schema: Schema<NodeField>,
    pub job_schema: Schema<JobField>,
    /// grep pattern selecting interactive job steps in the process list
    pub session_filter: String,
}

impl ClusterQuery {
    pub fn inventory_command(&self) -> String {
        self.node_schema.command()
    }

    pub fn job_command(&self) -> String {
        self.job_schema.command()
    }

    pub fn session_command(&self) -> String {
        session::command(&self.session_filter)
    }

    /// Inventory, then interactive sessions, then the job queue.
    #[instrument(skip_all, fields(hosts = ?self.hosts))]
    pub fn collect<S>(&self, shell: &S, rules: ClusterRules, now: NaiveDateTime) -> Cluster
    where
        S: RemoteShell + ?Sized,
    {
        let inventory_command = self.inventory_command();
        let nodes = parse_inventory(query_cluster(shell, &inventory_command, &self.hosts), &self.node_schema);

        let session_command = self.session_command();
        let sessions: HashSet<Session> = parse_sessions(query_cluster(shell, &session_command, &self.hosts));

        let job_command = self.job_command();
        let mut cluster = Cluster::new(rules, nodes);
        cluster.read_jobs(
            query_cluster(shell, &job_command, &self.hosts),
            &self.job_schema,
            &sessions,
            now,
        );
        info!("cluster state collected");
        cluster
    }
}
