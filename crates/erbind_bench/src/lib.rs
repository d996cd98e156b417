//! Benchmark utilities.

use erbind_core::{SessionConfig, SystemConfiguration};
use erbind_native::{drop_memory_repository, memory_repository};

/// A uniquely named in-memory repository, forgotten on drop.
pub struct BenchRepository {
    name: String,
}

impl BenchRepository {
    /// Creates a repository with `entities` entities.
    ///
    /// Entity `n` has `n % max_size + 1` records and its own name feature.
    pub fn populated(entities: i64, max_size: i64) -> Self {
        let name = format!("bench-{}", uuid::Uuid::new_v4());
        {
            let repo = memory_repository(&name);
            let mut repo = repo.write();
            for entity_id in 1..=entities {
                let feature = repo
                    .add_feature("NAME", &format!("ENTITY {entity_id}"))
                    .expect("Failed to add feature");
                for n in 0..(entity_id % max_size + 1) {
                    let record_id = format!("{entity_id}-{n}");
                    repo.add_record("TEST", &record_id, entity_id, &[feature])
                        .expect("Failed to add record");
                }
            }
        }
        Self { name }
    }

    /// Returns a session configuration pointing at the repository.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(SystemConfiguration::simple(&format!("memory://{}", self.name)))
            .module_name("erbind-bench")
    }
}

impl Drop for BenchRepository {
    fn drop(&mut self) {
        drop_memory_repository(&self.name);
    }
}

/// Generates `count` distinct `AddDataSource` requests.
pub fn data_source_requests(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!(r#"{{"DSRC_CODE":"BENCH_{i}"}}"#))
        .collect()
}
