use serde::Serialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, RefreshKind, System};

/// 單一階段的耗時紀錄
#[derive(Debug, Clone, Serialize)]
pub struct PhaseTiming {
    pub phase: String,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub phases: Vec<PhaseTiming>,
    pub total_ms: u128,
    pub peak_memory_mb: Option<u64>,
}

/// Records how long each ETL phase took and, with the `cli` feature, the
/// process's peak resident memory.
pub struct RunMonitor {
    enabled: bool,
    start_time: Instant,
    last_mark: Mutex<Instant>,
    phases: Mutex<Vec<PhaseTiming>>,
    peak_memory_mb: Mutex<Option<u64>>,
    #[cfg(feature = "cli")]
    probe: Option<MemoryProbe>,
}

#[cfg(feature = "cli")]
struct MemoryProbe {
    system: Mutex<System>,
    pid: Pid,
}

#[cfg(feature = "cli")]
impl MemoryProbe {
    fn new() -> Option<Self> {
        let pid = sysinfo::get_current_pid().ok()?;
        let mut system = System::new_with_specifics(RefreshKind::everything());
        system.refresh_all();
        Some(Self {
            system: Mutex::new(system),
            pid,
        })
    }

    fn current_memory_mb(&self) -> Option<u64> {
        let mut system = self.system.lock().ok()?;
        system.refresh_all();
        let process = system.process(self.pid)?;
        Some(process.memory() / 1024 / 1024)
    }
}

impl RunMonitor {
    pub fn new(enabled: bool) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            start_time: now,
            last_mark: Mutex::new(now),
            phases: Mutex::new(Vec::new()),
            peak_memory_mb: Mutex::new(None),
            #[cfg(feature = "cli")]
            probe: if enabled { MemoryProbe::new() } else { None },
        }
    }

    /// 結束目前階段並記錄耗時
    pub fn mark_phase(&self, phase: &str) {
        if !self.enabled {
            return;
        }

        let now = Instant::now();
        let elapsed = match self.last_mark.lock() {
            Ok(mut last) => {
                let elapsed = now.duration_since(*last);
                *last = now;
                elapsed
            }
            Err(_) => Duration::ZERO,
        };

        let memory_mb = self.sample_memory();
        if let Ok(mut phases) = self.phases.lock() {
            phases.push(PhaseTiming {
                phase: phase.to_string(),
                elapsed_ms: elapsed.as_millis(),
            });
        }

        match memory_mb {
            Some(mb) => tracing::info!("📊 {} took {:?}, memory {}MB", phase, elapsed, mb),
            None => tracing::info!("📊 {} took {:?}", phase, elapsed),
        }
    }

    pub fn stats(&self) -> Option<RunStats> {
        if !self.enabled {
            return None;
        }

        let phases = self.phases.lock().ok()?.clone();
        let peak_memory_mb = *self.peak_memory_mb.lock().ok()?;
        Some(RunStats {
            phases,
            total_ms: self.start_time.elapsed().as_millis(),
            peak_memory_mb,
        })
    }

    pub fn log_final_stats(&self) {
        if let Some(stats) = self.stats() {
            match stats.peak_memory_mb {
                Some(peak) => tracing::info!(
                    "📊 Final Stats - Total Time: {}ms, Peak Memory: {}MB",
                    stats.total_ms,
                    peak
                ),
                None => tracing::info!("📊 Final Stats - Total Time: {}ms", stats.total_ms),
            }
        }
    }

    #[cfg(feature = "cli")]
    fn sample_memory(&self) -> Option<u64> {
        let current = self.probe.as_ref()?.current_memory_mb()?;
        let mut peak = self.peak_memory_mb.lock().ok()?;
        if peak.map_or(true, |p| current > p) {
            *peak = Some(current);
        }
        Some(current)
    }

    // 非 CLI 環境不取樣記憶體
    #[cfg(not(feature = "cli"))]
    fn sample_memory(&self) -> Option<u64> {
        None
    }
}

impl Default for RunMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_records_nothing() {
        let monitor = RunMonitor::new(false);
        monitor.mark_phase("extract");
        assert!(monitor.stats().is_none());
    }

    #[test]
    fn test_enabled_monitor_keeps_phase_order() {
        let monitor = RunMonitor::new(true);
        monitor.mark_phase("extract");
        monitor.mark_phase("transform");
        monitor.mark_phase("load");

        let stats = monitor.stats().unwrap();
        let names: Vec<&str> = stats.phases.iter().map(|p| p.phase.as_str()).collect();
        assert_eq!(names, vec!["extract", "transform", "load"]);
    }
}
