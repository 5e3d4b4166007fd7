//! Container resource sampling.
//!
//! A background task owns the output file. It appends one line per
//! container every period and records phase boundaries sent over a
//! channel by the harness.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, SecondsFormat};
use serde::Deserialize;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Delay before the first sample after a phase change.
const PHASE_RESAMPLE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("stats output: {0}")]
    Io(#[from] std::io::Error),

    #[error("docker stats exited with {status}: {stderr}")]
    Command { status: String, stderr: String },

    #[error("invalid docker stats line: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("stats collector is no longer running")]
    Stopped,
}

/// One container as reported by `docker stats --format '{{json .}}'`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContainerStats {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "CPUPerc")]
    pub cpu: String,
    #[serde(rename = "MemUsage")]
    pub memory: String,
    #[serde(rename = "MemPerc")]
    pub memory_percent: String,
    #[serde(rename = "NetIO")]
    pub net_io: String,
    #[serde(rename = "BlockIO")]
    pub block_io: String,
    #[serde(rename = "PIDs")]
    pub pids: String,
}

impl ContainerStats {
    /// Output line for this sample, including the leading newline.
    pub fn line(&self, at: &str) -> String {
        format!(
            "\n{at} CONTAINER={}: CPU={}; MEMORY=Raw={} Percent={}; IO=Network={} Block={}; PIDS={}",
            self.name,
            self.cpu,
            self.memory,
            self.memory_percent,
            self.net_io,
            self.block_io,
            self.pids
        )
    }
}

/// Source of container samples.
#[async_trait]
pub trait StatsSampler: Send + Sync + 'static {
    async fn sample(&self) -> Result<Vec<ContainerStats>, StatsError>;
}

/// Samples through the local docker CLI.
#[derive(Debug, Clone, Default)]
pub struct DockerCli;

#[async_trait]
impl StatsSampler for DockerCli {
    async fn sample(&self) -> Result<Vec<ContainerStats>, StatsError> {
        let output = Command::new("docker")
            .args(["stats", "--no-stream", "--format", "{{json .}}"])
            .output()
            .await?;

        if !output.status.success() {
            return Err(StatsError::Command {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_stats(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse one JSON object per line.
pub fn parse_stats(output: &str) -> Result<Vec<ContainerStats>, StatsError> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(StatsError::from))
        .collect()
}

fn timestamp(at: DateTime<Local>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, false)
}

enum Control {
    Phase(String),
    Stop,
}

/// Handle to a running collector.
pub struct StatsHandle {
    tx: mpsc::Sender<Control>,
    task: JoinHandle<Result<(), StatsError>>,
}

impl StatsHandle {
    /// Close the current phase and open `name`.
    pub async fn change_phase(&self, name: impl Into<String>) -> Result<(), StatsError> {
        self.tx
            .send(Control::Phase(name.into()))
            .await
            .map_err(|_| StatsError::Stopped)
    }

    /// Flush and close the output file.
    pub async fn stop(self) -> Result<(), StatsError> {
        // The task may already have exited with an error; join reports it.
        let _ = self.tx.send(Control::Stop).await;
        self.task.await.map_err(|_| StatsError::Stopped)?
    }
}

/// Background writer of container samples and phase boundaries.
pub struct StatsCollector<S> {
    sampler: S,
    writer: BufWriter<File>,
    period: Duration,
    phase: Option<(String, DateTime<Local>)>,
}

impl<S: StatsSampler> StatsCollector<S> {
    /// Create (truncate) `path` and start sampling every `period`.
    pub async fn spawn(
        sampler: S,
        path: impl AsRef<Path>,
        period: Duration,
    ) -> Result<StatsHandle, StatsError> {
        let path = path.as_ref();
        let file = File::create(path).await?;
        info!(path = %path.display(), period_secs = period.as_secs(), "Collecting container stats");

        let collector = Self {
            sampler,
            writer: BufWriter::new(file),
            period,
            phase: None,
        };

        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(collector.run(rx));
        Ok(StatsHandle { tx, task })
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Control>) -> Result<(), StatsError> {
        let next_sample = tokio::time::sleep(self.period);
        tokio::pin!(next_sample);

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Control::Phase(name)) => {
                        self.change_phase(name).await?;
                        next_sample.as_mut().reset(Instant::now() + PHASE_RESAMPLE);
                    }
                    Some(Control::Stop) | None => break,
                },
                () = &mut next_sample => {
                    self.collect().await?;
                    next_sample.as_mut().reset(Instant::now() + self.period);
                }
            }
        }

        self.writer.flush().await?;
        self.writer.into_inner().sync_all().await?;
        debug!("Container stats collector stopped");
        Ok(())
    }

    async fn collect(&mut self) -> Result<(), StatsError> {
        let at = timestamp(Local::now());
        match self.sampler.sample().await {
            Ok(stats) => {
                for container in &stats {
                    self.writer.write_all(container.line(&at).as_bytes()).await?;
                }
            }
            Err(e) => warn!(error = %e, "Failed to collect container stats"),
        }
        self.writer.flush().await?;
        Ok(())
    }

    async fn change_phase(&mut self, name: String) -> Result<(), StatsError> {
        let now = Local::now();

        if let Some((previous, started)) = self.phase.take() {
            let elapsed = (now - started).to_std().unwrap_or_default();
            let line = format!(
                "\nEND {previous}; STARTTIME={}; ENDTIME={}; ELAPSEDTIME={elapsed:?}",
                timestamp(started),
                timestamp(now),
            );
            self.writer.write_all(line.as_bytes()).await?;
        }

        let line = format!("\n\nSTART {name}; STARTTIME={}", timestamp(now));
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;

        debug!(phase = %name, "Stats phase changed");
        self.phase = Some((name, now));
        Ok(())
    }
}
