//! Data model and parsers behind the GPU usage dashboard.
//!
//! The cluster is read through three queries per head node (node inventory, interactive
//! shells in the process list, job queue), which are parsed into a [`cluster::Cluster`]
//! holding nodes, users and jobs for exactly one run.
pub mod cluster;
pub mod job;
pub mod misc;
pub mod node;
pub mod nodelist;
pub mod query;
pub mod schema;
pub mod session;
pub mod slurm;
pub mod user;

/// GPUs one person may hold at once before their jobs are flagged.
pub const DEFAULT_GPU_QUOTA: usize = 5;

/// Nodes named `guppy<number>` are ordered by number.
pub const DEFAULT_NODE_PREFIX: &str = "guppy";

/// Job command of an interactive shell.
pub const DEFAULT_INTERACTIVE_COMMAND: &str = "bash";

pub const DEFAULT_SSH_PROGRAM: &str = "ssh";

/// Never wait for a password prompt.
pub const DEFAULT_SSH_OPTIONS: [&str; 2] = ["-o", "BatchMode=yes"];
