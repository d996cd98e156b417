//! Repository diagnostic commands.

use super::{format_size, session_config, write_json, CommandResult};
use erbind_core::{BindResult, DiagnosticService, EntityRow};
use serde::Serialize;
use std::io::Write;
use tracing::debug;

/// Host resources seen by the engine.
#[derive(Debug, Serialize)]
struct SystemReport {
    physical_cores: i32,
    logical_cores: i32,
    total_memory: i64,
    available_memory: i64,
}

/// Rows of an entity list.
#[derive(Debug, Serialize)]
struct EntityListing {
    minimum_size: i32,
    entities: Vec<EntityRow>,
    truncated: bool,
}

fn open(database_url: Option<&str>, verbose: bool) -> BindResult<DiagnosticService> {
    let service = DiagnosticService::new();
    service.init(&session_config(database_url, verbose))?;
    Ok(service)
}

/// Runs one JSON-returning query and prints its result.
fn query(
    out: &mut dyn Write,
    database_url: Option<&str>,
    verbose: bool,
    format: &str,
    f: impl FnOnce(&DiagnosticService) -> BindResult<String>,
) -> CommandResult {
    let service = open(database_url, verbose)?;
    let result = f(&service);
    service.destroy()?;
    write_json(out, &result?, format)
}

/// Prints cores and memory.
pub fn system(
    out: &mut dyn Write,
    database_url: Option<&str>,
    verbose: bool,
    format: &str,
) -> CommandResult {
    let service = open(database_url, verbose)?;
    let report = SystemReport {
        physical_cores: service.get_physical_cores()?,
        logical_cores: service.get_logical_cores()?,
        total_memory: service.get_total_system_memory()?,
        available_memory: service.get_available_memory()?,
    };
    service.destroy()?;

    if format == "json" {
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        writeln!(out, "System")?;
        writeln!(out, "======")?;
        writeln!(out, "Physical cores:   {}", report.physical_cores)?;
        writeln!(out, "Logical cores:    {}", report.logical_cores)?;
        writeln!(
            out,
            "Total memory:     {}",
            format_size(report.total_memory.unsigned_abs())
        )?;
        writeln!(
            out,
            "Available memory: {}",
            format_size(report.available_memory.unsigned_abs())
        )?;
    }
    Ok(())
}

/// Prints the database description.
pub fn db_info(
    out: &mut dyn Write,
    database_url: Option<&str>,
    verbose: bool,
    format: &str,
) -> CommandResult {
    query(out, database_url, verbose, format, |s| s.get_db_info())
}

/// Prints per data source counts.
pub fn data_sources(
    out: &mut dyn Write,
    database_url: Option<&str>,
    verbose: bool,
    format: &str,
) -> CommandResult {
    query(out, database_url, verbose, format, |s| {
        s.get_data_source_counts()
    })
}

/// Prints resolution totals, and mapping counts when `mapping` is set.
pub fn stats(
    out: &mut dyn Write,
    database_url: Option<&str>,
    verbose: bool,
    mapping: bool,
    format: &str,
) -> CommandResult {
    query(out, database_url, verbose, format, |s| {
        if mapping {
            s.get_mapping_statistics(false)
        } else {
            s.get_resolution_statistics()
        }
    })
}

/// Prints an entity's details.
pub fn entity(
    out: &mut dyn Write,
    database_url: Option<&str>,
    verbose: bool,
    entity_id: i64,
    internal: bool,
    format: &str,
) -> CommandResult {
    query(out, database_url, verbose, format, |s| {
        s.get_entity_details(entity_id, internal)
    })
}

/// Prints entities with at least `size` records, up to `limit` rows.
pub fn entities_by_size(
    out: &mut dyn Write,
    database_url: Option<&str>,
    verbose: bool,
    size: i32,
    limit: usize,
    format: &str,
) -> CommandResult {
    let service = open(database_url, verbose)?;
    let mut entities = Vec::new();
    let mut truncated = false;
    {
        let mut rows = service.entities_by_size(size)?;
        for row in rows.by_ref() {
            if entities.len() == limit {
                truncated = true;
                break;
            }
            entities.push(row?);
        }
        rows.close()?;
    }
    debug!(count = entities.len(), truncated, "entity list read");
    service.destroy()?;

    let listing = EntityListing {
        minimum_size: size,
        entities,
        truncated,
    };

    if format == "json" {
        writeln!(out, "{}", serde_json::to_string_pretty(&listing)?)?;
    } else {
        writeln!(out, "Entities with at least {} record(s)", size)?;
        writeln!(out, "==================================")?;
        for row in &listing.entities {
            writeln!(
                out,
                "  {:>8}  size {:>4}  {}",
                row.entity_id,
                row.size,
                row.data_sources.join(",")
            )?;
        }
        writeln!(out, "Total: {}", listing.entities.len())?;
        if listing.truncated {
            writeln!(out, "(limit reached)")?;
        }
    }
    Ok(())
}

/// Runs the engine's write benchmark.
pub fn perf(
    out: &mut dyn Write,
    database_url: Option<&str>,
    verbose: bool,
    seconds: i32,
    format: &str,
) -> CommandResult {
    query(out, database_url, verbose, format, |s| s.check_db_perf(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::seed::sample_repository;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        url: String,
    }

    fn fixture(entities: i64) -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repo.json");
        sample_repository(entities).unwrap().save(&path).unwrap();
        Fixture {
            url: format!("file://{}", path.display()),
            _dir: dir,
        }
    }

    fn json(buf: Vec<u8>) -> serde_json::Value {
        serde_json::from_slice(&buf).unwrap()
    }

    #[test]
    fn system_report_is_positive() {
        let f = fixture(1);
        let mut buf = Vec::new();
        system(&mut buf, Some(&f.url), false, "json").unwrap();
        let report = json(buf);
        assert!(report["physical_cores"].as_i64().unwrap() > 0);
        assert!(report["logical_cores"].as_i64().unwrap() > 0);
        assert!(report["total_memory"].as_i64().unwrap() > 0);
    }

    #[test]
    fn db_info_names_database() {
        let f = fixture(3);
        let mut buf = Vec::new();
        db_info(&mut buf, Some(&f.url), false, "json").unwrap();
        let info = json(buf);
        assert_eq!(info["DATABASE_TYPE"], "file");
        assert_eq!(info["ENTITY_COUNT"], 3);
    }

    #[test]
    fn entity_details_and_bad_id() {
        let f = fixture(3);
        let mut buf = Vec::new();
        entity(&mut buf, Some(&f.url), false, 2, true, "json").unwrap();
        assert!(json(buf)["RESOLVED_ENTITY"].is_object());

        let mut buf = Vec::new();
        let err = entity(&mut buf, Some(&f.url), false, 0, false, "json").unwrap_err();
        assert!(err.to_string().starts_with("invalid input"));
    }

    #[test]
    fn entities_by_size_honors_limit() {
        let f = fixture(9);
        let mut buf = Vec::new();
        entities_by_size(&mut buf, Some(&f.url), false, 2, 100, "json").unwrap();
        let all = json(buf);
        // sizes cycle 2, 3, 1
        assert_eq!(all["entities"].as_array().unwrap().len(), 6);
        assert_eq!(all["truncated"], false);

        let mut buf = Vec::new();
        entities_by_size(&mut buf, Some(&f.url), false, 2, 4, "json").unwrap();
        let some = json(buf);
        assert_eq!(some["entities"].as_array().unwrap().len(), 4);
        assert_eq!(some["truncated"], true);

        let mut buf = Vec::new();
        entities_by_size(&mut buf, Some(&f.url), false, 3, 100, "text").unwrap();
        assert!(String::from_utf8(buf).unwrap().contains("Total: 3"));
    }

    #[test]
    fn stats_and_perf() {
        let f = fixture(4);
        let mut buf = Vec::new();
        stats(&mut buf, Some(&f.url), false, false, "json").unwrap();
        assert!(json(buf)["RESOLUTION_STATISTICS"].is_object());

        let mut buf = Vec::new();
        stats(&mut buf, Some(&f.url), false, true, "json").unwrap();
        assert!(json(buf)["MAPPING_STATISTICS"].is_array());

        let mut buf = Vec::new();
        perf(&mut buf, Some(&f.url), false, 0, "json").unwrap();
        assert!(json(buf).get("numRecordsInserted").is_some());
    }
}
