use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use ksync::trace::{ConsoleTrace, LogTrace, NullTrace, TraceSink};
use log::info;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

pub fn init_logging(max_level: &str) {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(max_level));
}

/// Builds the trace sink named on the command line.
pub fn make_sink(kind: &str) -> Result<Arc<dyn TraceSink>> {
    let sink: Arc<dyn TraceSink> = match kind {
        "console" => Arc::new(ConsoleTrace),
        "log" => Arc::new(LogTrace),
        "none" => Arc::new(NullTrace),
        _ => bail!("Invalid trace sink: {} (expected console, log or none)", kind),
    };
    Ok(sink)
}

/// Splits `total` units of work over `workers`, front-loading the remainder.
pub fn split_work(total: usize, workers: usize) -> Vec<usize> {
    if workers == 0 {
        return vec![];
    }
    let base = total / workers;
    let extra = total % workers;
    (0..workers)
        .map(|w| base + usize::from(w < extra))
        .collect()
}

pub fn write_summary(filename: &str, summary: &serde_json::Value) -> Result<()> {
    info!("Dumping summary to {}", filename);
    if let Some(parent) = Path::new(filename).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    std::fs::write(filename, serde_json::to_string_pretty(summary)?)
        .with_context(|| format!("writing {}", filename))?;
    Ok(())
}

/// Reads back the values recorded through the `metrics` macros.
pub struct MetricsRecorder {
    snapshotter: Snapshotter,
}

impl MetricsRecorder {
    /// Installs a debugging recorder as the process-wide metrics recorder.
    pub fn install() -> Result<Self> {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        recorder
            .install()
            .map_err(|_| anyhow!("A metrics recorder is already installed"))?;
        Ok(Self { snapshotter })
    }

    /// Runs `f` with a recorder that only sees what this thread records.
    pub fn scoped<T>(f: impl FnOnce() -> T) -> (Self, T) {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let out = metrics::with_local_recorder(&recorder, f);
        (Self { snapshotter }, out)
    }

    /// Counter and gauge values by metric name. Histograms are skipped.
    pub fn snapshot_values(&self) -> BTreeMap<String, f64> {
        self.snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(ckey, _unit, _descr, value)| {
                let name = ckey.key().name().to_owned();
                match value {
                    DebugValue::Counter(v) => Some((name, v as f64)),
                    DebugValue::Gauge(v) => Some((name, v.into_inner())),
                    DebugValue::Histogram(_) => None,
                }
            })
            .collect()
    }
}
