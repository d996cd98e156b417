//! Test fixtures and repository helpers.
//!
//! Provides uniquely named repositories that clean up after themselves, and
//! services already initialized against them.

use erbind_core::{ConfigService, DiagnosticService, SessionConfig, SystemConfiguration};
use erbind_native::{drop_memory_repository, memory_repository, Repository};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Module name used by fixture sessions.
pub const FIXTURE_MODULE: &str = "erbind-testkit";

/// A test repository with automatic cleanup.
pub struct TestRepository {
    url: String,
    location: Location,
}

enum Location {
    Memory(String),
    File { path: PathBuf, _dir: TempDir },
}

impl TestRepository {
    /// Creates an empty, uniquely named in-memory repository.
    pub fn memory() -> Self {
        Self::memory_with(|_| {})
    }

    /// Creates an in-memory repository populated by `build`.
    pub fn memory_with(build: impl FnOnce(&mut Repository)) -> Self {
        let name = format!("testkit-{}", uuid::Uuid::new_v4());
        build(&mut memory_repository(&name).write());
        Self {
            url: format!("memory://{name}"),
            location: Location::Memory(name),
        }
    }

    /// Creates a repository snapshot file populated by `build`.
    pub fn file_with(build: impl FnOnce(&mut Repository)) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("repository.json");
        let mut repo = Repository::new();
        build(&mut repo);
        repo.save(&path).expect("Failed to write repository snapshot");
        Self {
            url: format!("file://{}", path.display()),
            location: Location::File { path, _dir: dir },
        }
    }

    /// Returns the database URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the snapshot path for file repositories.
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File { path, .. } => Some(path),
            Location::Memory(_) => None,
        }
    }

    /// Returns the session configuration for this repository.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(SystemConfiguration::simple(&self.url)).module_name(FIXTURE_MODULE)
    }

    /// Returns an initialized configuration service.
    pub fn config_service(&self) -> ConfigService {
        let service = ConfigService::new();
        service
            .init(&self.session_config())
            .expect("Failed to initialize config service");
        service
    }

    /// Returns an initialized diagnostic service.
    pub fn diagnostic_service(&self) -> DiagnosticService {
        let service = DiagnosticService::new();
        service
            .init(&self.session_config())
            .expect("Failed to initialize diagnostic service");
        service
    }
}

impl Drop for TestRepository {
    fn drop(&mut self) {
        if let Location::Memory(name) = &self.location {
            drop_memory_repository(name);
        }
    }
}

/// Runs a test with a ready configuration service on a fresh repository.
pub fn with_config_service<F, R>(f: F) -> R
where
    F: FnOnce(&ConfigService) -> R,
{
    let repo = TestRepository::memory();
    let service = repo.config_service();
    f(&service)
}

/// Runs a test with a ready diagnostic service on the standard scenario.
pub fn with_diagnostic_service<F, R>(f: F) -> R
where
    F: FnOnce(&DiagnosticService) -> R,
{
    let repo = scenarios::resolved_repository();
    let service = repo.diagnostic_service();
    f(&service)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Entity IDs of [`populate_resolved`] with their record counts.
    pub const RESOLVED_ENTITIES: [(i64, usize); 4] = [(1, 12), (2, 10), (3, 3), (4, 1)];

    /// Loads four entities: 1 and 2 are large enough for a size-10 list,
    /// 1 and 2 share a phone and are related, 3 and 4 share a name.
    pub fn populate_resolved(repo: &mut Repository) {
        let ann = repo.add_feature("NAME", "ANN LEE").expect("Failed to add feature");
        let bob = repo.add_feature("NAME", "BOB RAY").expect("Failed to add feature");
        let cy = repo.add_feature("NAME", "CY PARK").expect("Failed to add feature");
        let phone = repo.add_feature("PHONE", "555-0199").expect("Failed to add feature");
        let email = repo
            .add_feature("EMAIL", "cy@example.com")
            .expect("Failed to add feature");

        let features: [&[i64]; 4] = [&[ann, phone], &[bob, phone], &[cy, email], &[cy]];
        for ((entity_id, size), feats) in RESOLVED_ENTITIES.iter().zip(features) {
            for n in 0..*size {
                let source = if n % 2 == 0 { "TEST" } else { "SEARCH" };
                repo.add_record(source, &format!("E{entity_id}-{n}"), *entity_id, feats)
                    .expect("Failed to add record");
            }
        }
        repo.add_relationship(1, 2, "+PHONE", 2)
            .expect("Failed to relate entities");
        repo.add_relationship(3, 4, "+NAME", 3)
            .expect("Failed to relate entities");
    }

    /// Creates an in-memory repository with [`populate_resolved`] loaded.
    pub fn resolved_repository() -> TestRepository {
        TestRepository::memory_with(populate_resolved)
    }

    /// Creates a snapshot file with [`populate_resolved`] loaded.
    pub fn resolved_file_repository() -> TestRepository {
        TestRepository::file_with(populate_resolved)
    }
}
