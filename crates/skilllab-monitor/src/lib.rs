//! Resource sampler (spec.md §5 supplement; grounded on
//! `original_source/utils/gpu_monitor.py`'s `GPUMonitor`): samples CPU and
//! memory on a configurable tick and persists each tick as one or more
//! [`ResourceSample`] rows via the Metrics Store.
//!
//! The original's `GPUMonitor` ran a background thread writing JSON log
//! files per activity and kept an NVML handle open for the process
//! lifetime. That shape doesn't fit a library: this sampler instead
//! discovers `nvidia-smi` with the `which` crate (the teacher's own pattern
//! for external-tool discovery, see `xchecker-doctor`/`xchecker-llm`) and
//! shells out per tick rather than linking NVML, trading a small amount of
//! per-sample overhead for zero FFI and no persistent driver handle.

use chrono::Utc;
use skilllab_errors::Result;
use skilllab_store::MetricsStore;
use skilllab_types::ResourceSample;
use std::time::Duration;
use sysinfo::System;
use tracing::{info, warn};

/// Drives periodic sampling for one named activity (e.g. `"pipeline"`,
/// `"train"`) until [`ResourceMonitor::stop`] is called or the handle is
/// dropped.
pub struct ResourceMonitor {
    system: System,
    activity: String,
    gpu_smi_path: Option<std::path::PathBuf>,
}

impl ResourceMonitor {
    /// Builds a monitor for `activity`, probing for `nvidia-smi` once up
    /// front (spec supplement: "GPU when `nvidia-smi` is discoverable").
    #[must_use]
    pub fn new(activity: impl Into<String>) -> Self {
        Self {
            system: System::new(),
            activity: activity.into(),
            gpu_smi_path: which::which("nvidia-smi").ok(),
        }
    }

    #[must_use]
    pub fn has_gpu(&self) -> bool {
        self.gpu_smi_path.is_some()
    }

    /// Takes one sample now: one CPU/memory row, plus one additional row
    /// per GPU index reported by `nvidia-smi` when available (spec.md §3
    /// ResourceSample: "one row per GPU per tick").
    pub fn sample(&mut self) -> Vec<ResourceSample> {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let timestamp = Utc::now();
        let cpu_percent = f64::from(self.system.global_cpu_usage());
        let memory_mb = self.system.used_memory() as f64 / (1024.0 * 1024.0);

        let mut samples = vec![ResourceSample {
            timestamp,
            activity: self.activity.clone(),
            cpu_percent,
            memory_mb,
            gpu_index: None,
            gpu_percent: None,
            gpu_memory_mb: None,
        }];

        samples.extend(self.sample_gpus(timestamp));
        samples
    }

    fn sample_gpus(&self, timestamp: chrono::DateTime<Utc>) -> Vec<ResourceSample> {
        let Some(smi) = &self.gpu_smi_path else {
            return Vec::new();
        };

        let output = std::process::Command::new(smi)
            .args(["--query-gpu=index,utilization.gpu,memory.used", "--format=csv,noheader,nounits"])
            .output();

        let output = match output {
            Ok(o) if o.status.success() => o,
            Ok(o) => {
                warn!(status = ?o.status, "nvidia-smi exited non-zero, skipping GPU sample");
                return Vec::new();
            }
            Err(e) => {
                warn!(%e, "failed to execute nvidia-smi, skipping GPU sample");
                return Vec::new();
            }
        };

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| parse_gpu_line(line, timestamp, &self.activity))
            .collect()
    }

    /// Runs the sampling loop until `cancelled` is set, persisting every
    /// sample via `store` (spec supplement: "persisted through
    /// `skilllab-store`"). Intended to run as a spawned tokio task
    /// alongside a pipeline run.
    pub async fn run_until_cancelled(
        &mut self,
        store: &MetricsStore,
        interval: Duration,
        cancelled: &std::sync::atomic::AtomicBool,
    ) -> Result<u32> {
        let mut ticks = 0u32;
        while !cancelled.load(std::sync::atomic::Ordering::SeqCst) {
            for sample in self.sample() {
                store.insert_resource_sample(&sample).await?;
            }
            ticks += 1;
            tokio::time::sleep(interval).await;
        }
        info!(activity = %self.activity, ticks, "resource monitor stopped");
        Ok(ticks)
    }
}

fn parse_gpu_line(line: &str, timestamp: chrono::DateTime<Utc>, activity: &str) -> Option<ResourceSample> {
    let mut fields = line.split(',').map(str::trim);
    let index: u32 = fields.next()?.parse().ok()?;
    let gpu_percent: f64 = fields.next()?.parse().ok()?;
    let gpu_memory_mb: f64 = fields.next()?.parse().ok()?;
    Some(ResourceSample {
        timestamp,
        activity: activity.to_string(),
        cpu_percent: 0.0,
        memory_mb: 0.0,
        gpu_index: Some(index),
        gpu_percent: Some(gpu_percent),
        gpu_memory_mb: Some(gpu_memory_mb),
    })
}
