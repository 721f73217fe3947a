use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use crate::*;

/// Entry point invoked on every task of the job.
pub const TEST_ENTRY: &str = "test.py";

/// Fixed environment for every launched job: both NCCL transports are
/// disabled before the test program starts.
pub const FIXED_ENV: &[(&str, &str)] = &[("NCCL_IB_DISABLE", "1"), ("NCCL_P2P_DISABLE", "1")];

/// Resource request for a test job, with the usual environment overrides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceRequest {
    /// Total task count (`--ntasks`).
    pub gpus: u32,
    /// GPUs per node (`--gres=gpu:` and `--ntasks-per-node`).
    pub gpus_per_node: u32,
    /// CPU cores reserved per task.
    pub cpus_per_task: u32,
}

impl Default for ResourceRequest {
    fn default() -> Self {
        ResourceRequest {
            gpus: 8,
            gpus_per_node: 8,
            cpus_per_task: 5,
        }
    }
}

impl ResourceRequest {
    /// Read `GPUS`, `GPUS_PER_NODE` and `CPUS_PER_TASK`, falling back to the
    /// defaults for any that are unset or empty.
    pub fn from_env() -> Result<Self> {
        let d = ResourceRequest::default();
        Ok(ResourceRequest {
            gpus: env_override("GPUS", d.gpus)?,
            gpus_per_node: env_override("GPUS_PER_NODE", d.gpus_per_node)?,
            cpus_per_task: env_override("CPUS_PER_TASK", d.cpus_per_task)?,
        })
    }
}

/// Extra raw tokens for the `srun` invocation, taken from `SRUN_ARGS`.
pub fn srun_args_from_env() -> Result<Vec<String>> {
    Ok(split_extra_args(&env_override(
        "SRUN_ARGS",
        String::new(),
    )?))
}

/// A fully-resolved test job, ready to be turned into an `srun` invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestJob {
    pub partition: String,
    pub job_name: String,
    pub config: PathBuf,
    pub checkpoint: PathBuf,
    pub resources: ResourceRequest,
    /// Spliced into the `srun` flags, ahead of the program to run.
    pub srun_args: Vec<String>,
    /// Forwarded verbatim to the test program, after its required arguments.
    pub py_args: Vec<String>,
}

impl TestJob {
    /// The full argument vector passed to `srun` (the program name itself
    /// excluded).
    pub fn argv(&self) -> Vec<OsString> {
        let r = &self.resources;
        let mut argv: Vec<OsString> = vec![
            "-p".into(),
            self.partition.clone().into(),
            format!("--job-name={}", self.job_name).into(),
            format!("--gres=gpu:{}", r.gpus_per_node).into(),
            format!("--ntasks={}", r.gpus).into(),
            format!("--ntasks-per-node={}", r.gpus_per_node).into(),
            format!("--cpus-per-task={}", r.cpus_per_task).into(),
            "--kill-on-bad-exit=1".into(),
        ];
        argv.extend(self.srun_args.iter().map(OsString::from));
        argv.extend(["python".into(), "-u".into(), TEST_ENTRY.into()]);
        argv.push(self.config.clone().into());
        argv.push(self.checkpoint.clone().into());
        argv.push("--launcher=slurm".into());
        argv.extend(self.py_args.iter().map(OsString::from));
        argv
    }

    /// Build the `srun` command, with the NCCL transports disabled in the
    /// child environment and the launcher's directory prepended to
    /// `PYTHONPATH` so the test program can find co-located code.
    pub fn command(&self) -> Result<Command> {
        let mut cmd = Command::new("srun");
        cmd.args(self.argv());
        for &(key, value) in FIXED_ENV {
            cmd.env(key, value);
        }
        let exe = std::env::current_exe().context("failed to locate the launcher binary")?;
        let dir = exe
            .parent()
            .ok_or_else(|| anyhow!("launcher binary has no parent directory: {:?}", exe))?;
        let pythonpath = std::env::var_os("PYTHONPATH");
        cmd.env(
            "PYTHONPATH",
            prepend_search_path(dir, pythonpath.as_deref()),
        );
        Ok(cmd)
    }
}
