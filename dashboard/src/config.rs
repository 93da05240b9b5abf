use std::path::{Path, PathBuf};

use cluster_data::cluster::ClusterRules;
use cluster_data::query::{ClusterQuery, SshShell};
use cluster_data::schema::{Field, JobField, NodeField, Schema, SchemaError};
use cluster_data::{
    DEFAULT_GPU_QUOTA, DEFAULT_INTERACTIVE_COMMAND, DEFAULT_NODE_PREFIX, DEFAULT_SSH_OPTIONS, DEFAULT_SSH_PROGRAM,
};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

const DEFAULT_HOST: &str = "cluster58";
const DEFAULT_SESSION_FILTER: &str = "[s]run.*--pty";
const DEFAULT_OUTPUT_PATH: &str = "index.html";
const DEFAULT_REFRESH_SECONDS: u32 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub hosts: Vec<String>,
    pub ssh_program: String,
    pub ssh_options: Vec<String>,
    pub gpu_quota: usize,
    pub node_prefix: String,
    pub interactive_command: String,
    pub session_filter: String,
    pub output_path: PathBuf,
    pub refresh_seconds: u32,
    #[serde(default = "all_fields")]
    pub node_fields: Vec<NodeField>,
    #[serde(default = "all_fields")]
    pub job_fields: Vec<JobField>,
}

fn all_fields<F: Field>() -> Vec<F> {
    F::ALL.to_vec()
}

impl Settings {
    /// Defaults, overridden by `path` if it exists, overridden by `DASHBOARD_*` variables.
    pub fn new(path: &Path) -> Result<Self, ConfigError> {
        Self::with_environment(path, Environment::with_prefix("dashboard"))
    }

    fn with_environment(path: &Path, environment: Environment) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("hosts", vec![DEFAULT_HOST])?
            .set_default("ssh_program", DEFAULT_SSH_PROGRAM)?
            .set_default("ssh_options", DEFAULT_SSH_OPTIONS.to_vec())?
            .set_default("gpu_quota", DEFAULT_GPU_QUOTA.to_string())?
            .set_default("node_prefix", DEFAULT_NODE_PREFIX)?
            .set_default("interactive_command", DEFAULT_INTERACTIVE_COMMAND)?
            .set_default("session_filter", DEFAULT_SESSION_FILTER)?
            .set_default("output_path", DEFAULT_OUTPUT_PATH)?
            .set_default("refresh_seconds", DEFAULT_REFRESH_SECONDS.to_string())?
            .add_source(File::new(&path.to_string_lossy(), FileFormat::Toml).required(false))
            .add_source(
                environment
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("hosts")
                    .with_list_parse_key("ssh_options"),
            )
            .build()?;

        builder.try_deserialize()
    }

    pub fn rules(&self) -> ClusterRules {
        ClusterRules {
            gpu_quota: self.gpu_quota,
            node_prefix: self.node_prefix.clone(),
            interactive_command: self.interactive_command.clone(),
        }
    }

    pub fn query(&self) -> Result<ClusterQuery, SchemaError> {
        Ok(ClusterQuery {
            hosts: self.hosts.clone(),
            node_schema: Schema::new(self.node_fields.clone())?,
            job_schema: Schema::new(self.job_fields.clone())?,
            session_filter: self.session_filter.clone(),
        })
    }

    pub fn shell(&self) -> SshShell {
        SshShell {
            program: self.ssh_program.clone(),
            options: self.ssh_options.clone(),
        }
    }
}
