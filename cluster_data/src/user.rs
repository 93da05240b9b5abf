use crate::job::JobRef;
use crate::slurm::SlurmUser;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: SlurmUser,
    /// GPUs a user may hold at once before being flagged
    pub gpu_quota: usize,
    jobs: Vec<JobRef>,
    gpu_used: usize,
}

impl User {
    pub fn new(name: SlurmUser, gpu_quota: usize) -> Self {
        Self {
            name,
            gpu_quota,
            jobs: Vec::new(),
            gpu_used: 0,
        }
    }

    pub fn add_job(&mut self, job: JobRef, gpus: usize) {
        self.jobs.push(job);
        self.gpu_used += gpus;
    }

    pub fn jobs(&self) -> &[JobRef] {
        &self.jobs
    }

    pub fn gpu_used(&self) -> usize {
        self.gpu_used
    }

    pub fn is_overusing(&self) -> bool {
        self.gpu_used > self.gpu_quota
    }

    pub fn tooltip(&self) -> String {
        if self.is_overusing() {
            format!("Using {} GPUs (too many!)", self.gpu_used)
        } else {
            format!("Using {} GPUs", self.gpu_used)
        }
    }
}
