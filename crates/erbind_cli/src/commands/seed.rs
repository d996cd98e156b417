//! Sample repository generation.

use super::CommandResult;
use erbind_native::{EngineResult, Repository};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

const DATA_SOURCES: [&str; 2] = ["TEST", "SEARCH"];

/// Summary of a generated repository.
#[derive(Debug, Serialize)]
struct SeedSummary {
    path: String,
    entities: i64,
    records: usize,
    features: usize,
    relationships: usize,
}

/// Builds a sample repository with `entities` entities.
///
/// Entity `n` has `(n % 3) + 1` records spread over the template's data
/// sources; consecutive entities share a phone number and are related.
pub fn sample_repository(entities: i64) -> EngineResult<Repository> {
    let mut repo = Repository::new();
    let mut previous_phone = None;

    for entity_id in 1..=entities {
        let name = repo.add_feature("NAME", &format!("ENTITY {entity_id}"))?;
        let phone = repo.add_feature("PHONE", &format!("555-{:04}", entity_id / 2))?;
        let size = (entity_id % 3) + 1;
        for n in 0..size {
            let source = DATA_SOURCES[(n % 2) as usize];
            repo.add_record(source, &format!("R{entity_id}-{n}"), entity_id, &[name, phone])?;
        }
        if previous_phone == Some(phone) {
            repo.add_relationship(entity_id - 1, entity_id, "+PHONE", 2)?;
        }
        previous_phone = Some(phone);
    }

    Ok(repo)
}

/// Writes a sample repository snapshot for `file://` database URLs.
pub fn run(out: &mut dyn Write, path: &Path, entities: i64, format: &str) -> CommandResult {
    if entities <= 0 {
        return Err(format!("entity count must be positive, got {entities}").into());
    }

    let repo = sample_repository(entities)?;
    repo.save(path)?;
    info!(path = %path.display(), entities, "repository written");

    let summary = SeedSummary {
        path: path.display().to_string(),
        entities,
        records: repo.records().len(),
        features: repo.features().len(),
        relationships: repo.relationships().len(),
    };

    if format == "json" {
        writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
    } else {
        writeln!(out, "Repository")?;
        writeln!(out, "==========")?;
        writeln!(out, "Path:          {}", summary.path)?;
        writeln!(out, "Entities:      {}", summary.entities)?;
        writeln!(out, "Records:       {}", summary.records)?;
        writeln!(out, "Features:      {}", summary.features)?;
        writeln!(out, "Relationships: {}", summary.relationships)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sample_shape() {
        let repo = sample_repository(6).unwrap();
        assert_eq!(repo.entity_ids().len(), 6);
        assert_eq!(repo.entity_size(1), 2);
        assert_eq!(repo.entity_size(2), 3);
        assert_eq!(repo.entity_size(3), 1);
        // (2,3) and (4,5) share a phone
        assert_eq!(repo.relationships().len(), 2);
    }

    #[test]
    fn writes_loadable_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repo.json");
        let mut buf = Vec::new();
        run(&mut buf, &path, 4, "text").unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Entities:      4"));
        let repo = Repository::load(&path).unwrap();
        assert_eq!(repo.entity_ids().len(), 4);
    }

    #[test]
    fn rejects_non_positive_count() {
        let dir = TempDir::new().unwrap();
        let mut buf = Vec::new();
        assert!(run(&mut buf, &dir.path().join("x.json"), 0, "text").is_err());
    }
}
