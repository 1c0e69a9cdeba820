use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use gridrun_core::errors::{ErrorInfo, GridError};
use gridrun_exec::backend::{ExecutionBackend, RunOptions};
use gridrun_exec::cluster::ClusterBackend;
use gridrun_exec::local::LocalBackend;
use gridrun_exec::scheduler::{ProcessScheduler, ResourceRequest};

/// Execution environment selected in the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Cluster,
}

/// Configuration of the bounded local process pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSettings {
    /// Simulation executable invoked as `command <dir>`.
    pub command: PathBuf,
    #[serde(default)]
    pub post_command: Option<PathBuf>,
    #[serde(default = "LocalSettings::default_max_workers")]
    pub max_workers: usize,
}

impl LocalSettings {
    const fn default_max_workers() -> usize {
        4
    }
}

/// Configuration of the scheduler-backed cluster backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSettings {
    /// Site wrapper submitting one job, printing the job id on stdout.
    pub submit_program: PathBuf,
    /// Site wrapper reporting a job's state token on stdout.
    pub status_program: PathBuf,
    /// Command run per entry inside the job allocation.
    pub command: String,
    /// Entries grouped into one scheduler job to limit job churn.
    #[serde(default = "ClusterSettings::default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "ClusterSettings::default_memory_mb")]
    pub memory_mb: u64,
    #[serde(default = "ClusterSettings::default_time_limit_min")]
    pub time_limit_min: u64,
    #[serde(default = "ClusterSettings::default_cpus")]
    pub cpus: u32,
    #[serde(default = "ClusterSettings::default_poll_secs")]
    pub poll_interval_secs: u64,
}

impl ClusterSettings {
    const fn default_batch_size() -> usize {
        1
    }

    const fn default_memory_mb() -> u64 {
        1024
    }

    const fn default_time_limit_min() -> u64 {
        60
    }

    const fn default_cpus() -> u32 {
        1
    }

    const fn default_poll_secs() -> u64 {
        10
    }
}

/// User-facing settings selecting and configuring the execution backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub environment: Environment,
    #[serde(default)]
    pub local: Option<LocalSettings>,
    #[serde(default)]
    pub cluster: Option<ClusterSettings>,
    /// Per-batch deadline in minutes.
    #[serde(default)]
    pub timeout_min: Option<u64>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, GridError> {
        let text = fs::read_to_string(path).map_err(|err| {
            GridError::Io(
                ErrorInfo::new("settings.read", "failed to read settings file")
                    .with_context("path", path.display().to_string())
                    .with_hint(err.to_string()),
            )
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, GridError> {
        let settings: Settings = toml::from_str(text).map_err(|err| {
            GridError::Serde(
                ErrorInfo::new("settings.parse", "failed to parse settings")
                    .with_hint(err.to_string()),
            )
        })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), GridError> {
        match self.environment {
            Environment::Local if self.local.is_none() => Err(GridError::Parameter(
                ErrorInfo::new(
                    "settings.local",
                    "local environment selected but [local] section missing",
                ),
            )),
            Environment::Cluster if self.cluster.is_none() => Err(GridError::Parameter(
                ErrorInfo::new(
                    "settings.cluster",
                    "cluster environment selected but [cluster] section missing",
                ),
            )),
            _ => Ok(()),
        }
    }

    /// Builds the execution backend these settings describe.
    pub fn backend(&self) -> Result<Box<dyn ExecutionBackend>, GridError> {
        match self.environment {
            Environment::Local => {
                let local = self.local.as_ref().ok_or_else(|| missing("local"))?;
                let mut backend = LocalBackend::new(&local.command, local.max_workers);
                if let Some(post) = &local.post_command {
                    backend = backend.with_post_command(post);
                }
                Ok(Box::new(backend))
            }
            Environment::Cluster => {
                let cluster = self.cluster.as_ref().ok_or_else(|| missing("cluster"))?;
                let scheduler =
                    ProcessScheduler::new(&cluster.submit_program, &cluster.status_program);
                let resources = ResourceRequest {
                    memory_mb: cluster.memory_mb,
                    time_limit_min: cluster.time_limit_min,
                    cpus: cluster.cpus,
                };
                Ok(Box::new(
                    ClusterBackend::new(Box::new(scheduler), cluster.command.clone())
                        .with_resources(resources),
                ))
            }
        }
    }

    /// Batch size the orchestrator should group entries by.
    pub fn batch_size(&self) -> usize {
        match self.environment {
            Environment::Local => 1,
            Environment::Cluster => self
                .cluster
                .as_ref()
                .map(|cluster| cluster.batch_size.max(1))
                .unwrap_or(1),
        }
    }

    /// Run options derived from the settings file.
    pub fn run_options(&self) -> RunOptions {
        let mut options = RunOptions::default();
        options.timeout = self.timeout_min.map(|minutes| Duration::from_secs(minutes * 60));
        if let Some(cluster) = &self.cluster {
            options.poll_interval = Duration::from_secs(cluster.poll_interval_secs.max(1));
        }
        options
    }
}

fn missing(section: &str) -> GridError {
    GridError::Parameter(
        ErrorInfo::new("settings.section", "required settings section missing")
            .with_context("section", section.to_string()),
    )
}
