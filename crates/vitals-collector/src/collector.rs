//! The agent's two sample sets and their refresh operations.

use std::collections::HashMap;
use std::sync::Mutex;

use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::RwLock;
use tracing::debug;

use vitals_core::Metric;

use crate::error::{CollectorError, CollectorResult};

/// Name of the poll counter reported with every batch.
pub const POLL_COUNT: &str = "PollCount";

/// Process figures plus the poll counter, refreshed on each poll tick.
#[derive(Default)]
struct RuntimeSample {
    poll_count: i64,
    gauges: HashMap<String, f64>,
}

/// Samples this process and its host through `sysinfo`.
pub struct Collector {
    runtime: RwLock<RuntimeSample>,
    utilization: RwLock<HashMap<String, f64>>,
    /// Per-process figures for the runtime set.
    process: Mutex<System>,
    /// Host memory and CPU for the utilization set. `sysinfo` keeps CPU
    /// deltas between refreshes, so the handle is reused.
    host: Mutex<System>,
    pid: Option<Pid>,
}

impl Collector {
    pub fn new() -> Self {
        let mut host = System::new();
        host.refresh_cpu_all();
        let pid = sysinfo::get_current_pid().ok();

        Self {
            runtime: RwLock::new(RuntimeSample::default()),
            utilization: RwLock::new(HashMap::new()),
            process: Mutex::new(System::new()),
            host: Mutex::new(host),
            pid,
        }
    }

    /// Bump `PollCount` and replace the runtime gauges.
    ///
    /// On a sampling failure the counter and the previous gauges are kept.
    pub async fn update_runtime_metrics(&self) -> CollectorResult<()> {
        let mut gauges = self.sample_runtime()?;
        gauges.retain(|_, v| v.is_finite());

        let mut runtime = self.runtime.write().await;
        runtime.poll_count = runtime.poll_count.wrapping_add(1);
        runtime.gauges = gauges;
        debug!(poll_count = runtime.poll_count, gauges = runtime.gauges.len(), "runtime metrics updated");
        Ok(())
    }

    /// Replace the host memory and per-core CPU gauges.
    pub async fn update_utilization_metrics(&self) -> CollectorResult<()> {
        let mut gauges = self.sample_utilization()?;
        gauges.retain(|_, v| v.is_finite());

        let mut utilization = self.utilization.write().await;
        *utilization = gauges;
        debug!(gauges = utilization.len(), "utilization metrics updated");
        Ok(())
    }

    /// `PollCount` as a counter followed by every sampled gauge.
    pub async fn list_metrics(&self) -> Vec<Metric> {
        let mut metrics = Vec::new();
        {
            let runtime = self.runtime.read().await;
            metrics.reserve(runtime.gauges.len() + 1);
            metrics.push(Metric::counter(POLL_COUNT, runtime.poll_count));
            metrics.extend(runtime.gauges.iter().map(|(id, v)| Metric::gauge(id.as_str(), *v)));
        }
        {
            let utilization = self.utilization.read().await;
            metrics.extend(utilization.iter().map(|(id, v)| Metric::gauge(id.as_str(), *v)));
        }
        metrics
    }

    fn sample_runtime(&self) -> CollectorResult<HashMap<String, f64>> {
        let pid = self
            .pid
            .ok_or_else(|| CollectorError::Process("pid unavailable on this platform".to_string()))?;

        let mut system = self
            .process
            .lock()
            .map_err(|_| CollectorError::Unavailable("process"))?;
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
        system.refresh_memory();

        let process = system
            .process(pid)
            .ok_or_else(|| CollectorError::Process(format!("pid {pid} not found")))?;

        let load = System::load_average();
        let gauges = HashMap::from([
            ("RandomValue".to_string(), rand::random::<f64>()),
            ("ProcessResidentMemory".to_string(), process.memory() as f64),
            ("ProcessVirtualMemory".to_string(), process.virtual_memory() as f64),
            ("ProcessCPUUsage".to_string(), f64::from(process.cpu_usage())),
            ("ProcessRunTime".to_string(), process.run_time() as f64),
            ("UsedMemory".to_string(), system.used_memory() as f64),
            ("AvailableMemory".to_string(), system.available_memory() as f64),
            ("TotalSwap".to_string(), system.total_swap() as f64),
            ("UsedSwap".to_string(), system.used_swap() as f64),
            ("LoadAverage1".to_string(), load.one),
            ("Uptime".to_string(), System::uptime() as f64),
        ]);
        Ok(gauges)
    }

    fn sample_utilization(&self) -> CollectorResult<HashMap<String, f64>> {
        let mut system = self
            .host
            .lock()
            .map_err(|_| CollectorError::Unavailable("memory"))?;
        system.refresh_memory();
        system.refresh_cpu_all();

        let total = system.total_memory();
        if total == 0 {
            return Err(CollectorError::Unavailable("memory"));
        }
        if system.cpus().is_empty() {
            return Err(CollectorError::Unavailable("cpu"));
        }

        let mut gauges = HashMap::with_capacity(system.cpus().len() + 2);
        gauges.insert("TotalMemory".to_string(), total as f64);
        gauges.insert("FreeMemory".to_string(), system.free_memory() as f64);
        for (i, cpu) in system.cpus().iter().enumerate() {
            gauges.insert(format!("CPUutilization{i}"), f64::from(cpu.cpu_usage()));
        }
        Ok(gauges)
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}
