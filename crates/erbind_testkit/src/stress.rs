//! Stress helpers for shared services.
//!
//! These drive one service from many threads and count outcomes, checking
//! that calls serialize on the native boundary and that handles stay
//! independent.

use erbind_core::{ConfigService, DiagnosticService};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 200,
            threads: 4,
        }
    }
}

/// Counts outcomes across threads.
#[derive(Default)]
struct Tally {
    successful: AtomicUsize,
    failed: AtomicUsize,
}

impl Tally {
    fn record(&self, ok: bool) {
        let counter = if ok { &self.successful } else { &self.failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn finish(&self, start: Instant) -> StressTestResult {
        StressTestResult::new(
            self.successful.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            start.elapsed(),
        )
    }
}

/// Each thread repeatedly creates a document, adds a thread-unique code,
/// checks that only its own code landed, and closes the document.
///
/// An operation succeeds only if the whole cycle succeeds.
pub fn stress_config_documents(service: &ConfigService, config: &StressConfig) -> StressTestResult {
    let tally = Tally::default();
    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..config.threads {
            let tally = &tally;
            scope.spawn(move || {
                let code = format!("THREAD_{t}");
                let request = crate::generators::data_source_request(&code);
                for _ in 0..config.operations {
                    let ok = (|| {
                        let handle = service.create()?;
                        service.add_data_source(handle, &request)?;
                        let codes = service.data_source_codes(handle)?;
                        service.close(handle)?;
                        let foreign = codes
                            .iter()
                            .any(|c| c.starts_with("THREAD_") && *c != code);
                        Ok::<_, erbind_core::BindError>(codes.contains(&code) && !foreign)
                    })()
                    .unwrap_or(false);
                    tally.record(ok);
                }
            });
        }
    });

    tally.finish(start)
}

/// Each thread repeatedly drains an entity list of `entity_size` and checks
/// it saw `expected` rows.
pub fn stress_entity_lists(
    service: &DiagnosticService,
    entity_size: i32,
    expected: usize,
    config: &StressConfig,
) -> StressTestResult {
    let tally = Tally::default();
    let start = Instant::now();

    thread::scope(|scope| {
        for _ in 0..config.threads {
            let tally = &tally;
            scope.spawn(move || {
                for _ in 0..config.operations {
                    let rows: Result<Vec<_>, _> = service
                        .entities_by_size(entity_size)
                        .and_then(|list| list.collect());
                    tally.record(matches!(rows, Ok(rows) if rows.len() == expected));
                }
            });
        }
    });

    tally.finish(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{scenarios, TestRepository};

    fn small() -> StressConfig {
        StressConfig {
            operations: 25,
            threads: 4,
        }
    }

    #[test]
    fn concurrent_documents_stay_independent() {
        let repo = TestRepository::memory();
        let service = repo.config_service();
        let result = stress_config_documents(&service, &small());
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.total_ops, 100);
        assert_eq!(service.open_handles(), 0);
    }

    #[test]
    fn concurrent_entity_lists() {
        let repo = scenarios::resolved_repository();
        let service = repo.diagnostic_service();
        let result = stress_entity_lists(&service, 10, 2, &small());
        assert_eq!(result.failed_ops, 0);
        assert_eq!(service.open_handles(), 0);
    }
}
