//! Background job dispatch with sidecar log files.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::Mutex;

use tracing::info;

use crate::process::kill_process_group;
use crate::process::set_new_session;

/// Descriptor returned when a command is dispatched to the background.
#[derive(Debug, Clone)]
pub struct BackgroundJob {
    pub job_id: String,
    pub pid: u32,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
}

impl BackgroundJob {
    /// Human-readable summary handed back to the model.
    pub fn describe(&self) -> String {
        format!(
            "background command dispatched\njob_id: {}\npid: {}\nstdout_log: {}\nstderr_log: {}\nhint: tail -f <log-path>\n",
            self.job_id,
            self.pid,
            self.stdout_path.display(),
            self.stderr_path.display(),
        )
    }
}

/// Registry of live background jobs.
///
/// Jobs are keyed by job id; children are reaped lazily when listed or killed.
#[derive(Debug, Clone, Default)]
pub struct BackgroundRegistry {
    jobs: Arc<Mutex<HashMap<String, tokio::process::Child>>>,
    counter: Arc<Mutex<u64>>,
}

impl BackgroundRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `command` detached, streaming output to logs under `log_dir`.
    pub fn spawn(
        &self,
        command: &str,
        shell: &str,
        cwd: &Path,
        env: &BTreeMap<String, String>,
        log_dir: &Path,
    ) -> std::io::Result<BackgroundJob> {
        std::fs::create_dir_all(log_dir)?;

        let job_id = self.next_job_id();
        let stdout_path = log_dir.join(format!("{job_id}.out.log"));
        let stderr_path = log_dir.join(format!("{job_id}.err.log"));
        let stdout_file = std::fs::File::create(&stdout_path)?;
        let stderr_file = std::fs::File::create(&stderr_path)?;

        let mut cmd = tokio::process::Command::new(shell);
        cmd.arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::from(stderr_file));
        for (key, value) in env {
            cmd.env(key, value);
        }
        set_new_session(&mut cmd);

        let child = cmd.spawn()?;
        let pid = child.id().unwrap_or(0);
        info!(job_id = %job_id, pid, command = %command, "background job started");

        let job = BackgroundJob {
            job_id: job_id.clone(),
            pid,
            stdout_path,
            stderr_path,
        };
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(job_id, child);
        }
        Ok(job)
    }

    /// Ids of jobs that have not been reaped yet.
    pub fn active_jobs(&self) -> Vec<String> {
        let mut jobs = match self.jobs.lock() {
            Ok(jobs) => jobs,
            Err(_) => return Vec::new(),
        };
        jobs.retain(|_, child| matches!(child.try_wait(), Ok(None)));
        jobs.keys().cloned().collect()
    }

    /// Kill a background job's process group. Returns false if unknown.
    pub fn kill(&self, job_id: &str) -> bool {
        let mut jobs = match self.jobs.lock() {
            Ok(jobs) => jobs,
            Err(_) => return false,
        };
        match jobs.remove(job_id) {
            Some(mut child) => {
                kill_process_group(&mut child);
                true
            }
            None => false,
        }
    }

    /// Kill everything still running. Used by the fatal-error cleanup pass.
    pub fn kill_all(&self) {
        if let Ok(mut jobs) = self.jobs.lock() {
            for (_, mut child) in jobs.drain() {
                if matches!(child.try_wait(), Ok(None)) {
                    kill_process_group(&mut child);
                }
            }
        }
    }

    fn next_job_id(&self) -> String {
        let mut counter = match self.counter.lock() {
            Ok(counter) => counter,
            Err(poisoned) => poisoned.into_inner(),
        };
        *counter += 1;
        format!("job-{:04}-{:08x}", *counter, std::process::id())
    }
}

#[cfg(test)]
#[path = "background.test.rs"]
mod tests;
