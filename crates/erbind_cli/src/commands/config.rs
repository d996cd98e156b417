//! Configuration document commands.

use super::{session_config, write_json, CommandResult};
use erbind_core::{ConfigHandle, ConfigService};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Data source listing.
#[derive(Debug, Serialize)]
struct DataSourceListing {
    count: usize,
    data_sources: Vec<String>,
}

/// Prints the default configuration document.
pub fn show(
    out: &mut dyn Write,
    database_url: Option<&str>,
    verbose: bool,
    format: &str,
) -> CommandResult {
    let service = open(database_url, verbose)?;
    let handle = service.create()?;
    let saved = service.save(handle)?;
    service.close(handle)?;
    service.destroy()?;

    write_json(out, &saved, format)
}

/// Adds data sources to a document and prints or writes the result.
pub fn add_data_source(
    out: &mut dyn Write,
    database_url: Option<&str>,
    verbose: bool,
    codes: &[String],
    input: Option<&Path>,
    output: Option<&Path>,
    format: &str,
) -> CommandResult {
    let service = open(database_url, verbose)?;
    let handle = load_or_create(&service, input)?;

    for code in codes {
        let request = serde_json::json!({ "DSRC_CODE": code }).to_string();
        let ack = service.add_data_source(handle, &request)?;
        info!(code = %code, ack = %ack, "data source added");
    }

    let saved = service.save(handle)?;
    service.close(handle)?;
    service.destroy()?;

    match output {
        Some(path) => {
            fs::write(path, &saved)?;
            if format == "json" {
                let summary = serde_json::json!({
                    "added": codes,
                    "output": path.display().to_string(),
                });
                writeln!(out, "{}", summary)?;
            } else {
                writeln!(
                    out,
                    "Added {} data source(s), saved to {}",
                    codes.len(),
                    path.display()
                )?;
            }
            Ok(())
        }
        None => write_json(out, &saved, format),
    }
}

/// Lists the data sources of a saved document, or of the default template.
pub fn list_data_sources(
    out: &mut dyn Write,
    database_url: Option<&str>,
    verbose: bool,
    input: Option<&Path>,
    format: &str,
) -> CommandResult {
    let service = open(database_url, verbose)?;
    let handle = load_or_create(&service, input)?;
    let data_sources = service.data_source_codes(handle)?;
    service.close(handle)?;
    service.destroy()?;

    let listing = DataSourceListing {
        count: data_sources.len(),
        data_sources,
    };

    if format == "json" {
        writeln!(out, "{}", serde_json::to_string_pretty(&listing)?)?;
    } else {
        writeln!(out, "Data Sources")?;
        writeln!(out, "============")?;
        for code in &listing.data_sources {
            writeln!(out, "  {}", code)?;
        }
        writeln!(out, "Total: {}", listing.count)?;
    }

    Ok(())
}

fn open(database_url: Option<&str>, verbose: bool) -> Result<ConfigService, erbind_core::BindError> {
    let service = ConfigService::new();
    service.init(&session_config(database_url, verbose))?;
    Ok(service)
}

fn load_or_create(
    service: &ConfigService,
    input: Option<&Path>,
) -> Result<ConfigHandle, Box<dyn std::error::Error>> {
    match input {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            Ok(service.load(&json)?)
        }
        None => Ok(service.create()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn url() -> String {
        format!("memory://cli-config-{}", uuid::Uuid::new_v4())
    }

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn show_prints_template() {
        let mut buf = Vec::new();
        show(&mut buf, Some(&url()), false, "json").unwrap();
        let text = output(buf);
        let value: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert!(value.is_object());
        assert!(text.contains("TEST"));
    }

    #[test]
    fn add_then_list_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let url = url();

        let mut buf = Vec::new();
        add_data_source(
            &mut buf,
            Some(&url),
            false,
            &["CUSTOMERS".to_string(), "WATCHLIST".to_string()],
            None,
            Some(&path),
            "text",
        )
        .unwrap();
        assert!(output(buf).contains("Added 2 data source(s)"));

        let mut buf = Vec::new();
        list_data_sources(&mut buf, Some(&url), false, Some(&path), "json").unwrap();
        let listing: serde_json::Value = serde_json::from_str(&output(buf)).unwrap();
        let codes = listing["data_sources"].as_array().unwrap();
        assert!(codes.iter().any(|c| c == "CUSTOMERS"));
        assert!(codes.iter().any(|c| c == "WATCHLIST"));
        assert_eq!(listing["count"].as_u64().unwrap() as usize, codes.len());
    }

    #[test]
    fn duplicate_code_fails() {
        let mut buf = Vec::new();
        let err = add_data_source(
            &mut buf,
            Some(&url()),
            false,
            &["DUP".to_string(), "DUP".to_string()],
            None,
            None,
            "json",
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("invalid input (7220)"));
    }

    #[test]
    fn bad_database_url_fails_init() {
        let mut buf = Vec::new();
        assert!(show(&mut buf, Some("ftp://nowhere"), false, "text").is_err());
    }
}
