//! Configuration documents.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Maximum length of a data source code.
pub const MAX_CODE_LEN: usize = 25;

/// First identifier handed to user-defined data sources.
const FIRST_USER_DSRC_ID: i64 = 1001;

/// A configuration document.
///
/// Serialized as `{"G2_CONFIG": {...}}`. The data source section (`CFG_DSRC`)
/// is managed by this type; every other section is kept verbatim so that a
/// loaded document saves back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(rename = "G2_CONFIG")]
    body: ConfigBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ConfigBody {
    #[serde(rename = "CFG_DSRC", default)]
    data_sources: Vec<DataSource>,
    #[serde(flatten)]
    sections: Map<String, Value>,
}

/// A data source entry of a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    /// Numeric identifier, unique within the document.
    #[serde(rename = "DSRC_ID")]
    pub id: i64,
    /// Code, unique within the document.
    #[serde(rename = "DSRC_CODE")]
    pub code: String,
    /// Free-form description.
    #[serde(rename = "DSRC_DESC", default)]
    pub description: String,
}

/// Parsed `add_data_source` / `delete_data_source` input.
#[derive(Debug, Deserialize)]
struct DataSourceRequest {
    #[serde(rename = "DSRC_CODE")]
    code: String,
    #[serde(rename = "DSRC_ID")]
    id: Option<i64>,
    #[serde(rename = "DSRC_DESC")]
    description: Option<String>,
}

impl ConfigDocument {
    /// Creates the default template document.
    pub fn template() -> Self {
        let mut sections = Map::new();
        sections.insert(
            "CFG_FTYPE".into(),
            json!([
                {"FTYPE_ID": 1, "FTYPE_CODE": "NAME"},
                {"FTYPE_ID": 2, "FTYPE_CODE": "ADDRESS"},
                {"FTYPE_ID": 3, "FTYPE_CODE": "PHONE"},
                {"FTYPE_ID": 4, "FTYPE_CODE": "EMAIL"}
            ]),
        );
        sections.insert(
            "CONFIG_BASE_VERSION".into(),
            json!({
                "VERSION": "1.0.0",
                "COMPATIBILITY_VERSION": {"CONFIG_VERSION": "1"}
            }),
        );

        Self {
            body: ConfigBody {
                data_sources: vec![
                    DataSource {
                        id: 1,
                        code: "TEST".into(),
                        description: "Test".into(),
                    },
                    DataSource {
                        id: 2,
                        code: "SEARCH".into(),
                        description: "Search".into(),
                    },
                ],
                sections,
            },
        }
    }

    /// Parses a serialized document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidJson` if the text is not a configuration document, and
    /// `InvalidArgument` if its data sources violate code or ID uniqueness.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let doc: Self = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Serializes the document.
    ///
    /// The output is deterministic: equal documents produce identical text.
    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string(self).map_err(|e| EngineError::Internal(e.to_string()))
    }

    /// Returns the data sources in insertion order.
    pub fn data_sources(&self) -> &[DataSource] {
        &self.body.data_sources
    }

    /// Returns the data source with the given code.
    pub fn data_source(&self, code: &str) -> Option<&DataSource> {
        self.body.data_sources.iter().find(|ds| ds.code == code)
    }

    /// Returns the feature type codes declared in `CFG_FTYPE`.
    pub fn feature_types(&self) -> Vec<String> {
        self.body
            .sections
            .get("CFG_FTYPE")
            .and_then(Value::as_array)
            .map(|types| {
                types
                    .iter()
                    .filter_map(|t| t.get("FTYPE_CODE").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Adds a data source from a `{"DSRC_CODE": ...}` request.
    ///
    /// Returns the identifier of the new data source.
    ///
    /// # Errors
    ///
    /// - `InvalidJson` if the request does not parse
    /// - `InvalidArgument` for a malformed code or a taken `DSRC_ID`
    /// - `DuplicateDataSource` if the code already exists
    pub fn add_data_source(&mut self, input_json: &str) -> EngineResult<i64> {
        let request: DataSourceRequest = serde_json::from_str(input_json)?;
        let code = normalize_code(&request.code)?;

        if self.data_source(&code).is_some() {
            return Err(EngineError::DuplicateDataSource(code));
        }

        let id = match request.id {
            Some(id) if id <= 0 => {
                return Err(EngineError::invalid_argument(format!(
                    "DSRC_ID must be positive, got {id}"
                )))
            }
            Some(id) if self.body.data_sources.iter().any(|ds| ds.id == id) => {
                return Err(EngineError::invalid_argument(format!(
                    "DSRC_ID {id} is already in use"
                )))
            }
            Some(id) => id,
            None => self.next_data_source_id()?,
        };

        let description = request.description.unwrap_or_else(|| code.clone());
        self.body.data_sources.push(DataSource {
            id,
            code,
            description,
        });
        Ok(id)
    }

    /// Deletes a data source named by a `{"DSRC_CODE": ...}` request.
    ///
    /// Returns whether a data source was removed.
    pub fn delete_data_source(&mut self, input_json: &str) -> EngineResult<bool> {
        let request: DataSourceRequest = serde_json::from_str(input_json)?;
        let code = normalize_code(&request.code)?;
        let before = self.body.data_sources.len();
        self.body.data_sources.retain(|ds| ds.code != code);
        Ok(self.body.data_sources.len() != before)
    }

    /// Renders the `list_data_sources` result.
    pub fn list_json(&self) -> String {
        let entries: Vec<Value> = self
            .body
            .data_sources
            .iter()
            .map(|ds| json!({"DSRC_ID": ds.id, "DSRC_CODE": ds.code}))
            .collect();
        json!({ "DATA_SOURCES": entries }).to_string()
    }

    fn next_data_source_id(&self) -> EngineResult<i64> {
        match self.body.data_sources.iter().map(|ds| ds.id).max() {
            None => Ok(FIRST_USER_DSRC_ID),
            Some(max) => max
                .checked_add(1)
                .map(|id| id.max(FIRST_USER_DSRC_ID))
                .ok_or_else(|| {
                    EngineError::ResourceLimit(format!(
                        "no DSRC_ID left after {max}; pass DSRC_ID explicitly"
                    ))
                }),
        }
    }

    fn validate(&self) -> EngineResult<()> {
        let sources = &self.body.data_sources;
        for (i, ds) in sources.iter().enumerate() {
            if normalize_code(&ds.code)? != ds.code {
                return Err(EngineError::invalid_argument(format!(
                    "data source code '{}' is not normalized",
                    ds.code
                )));
            }
            if sources[..i].iter().any(|other| other.code == ds.code || other.id == ds.id) {
                return Err(EngineError::invalid_argument(format!(
                    "duplicate data source '{}' (DSRC_ID {})",
                    ds.code, ds.id
                )));
            }
        }
        Ok(())
    }
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self::template()
    }
}

/// Trims and upper-cases a data source code and checks its shape.
fn normalize_code(raw: &str) -> EngineResult<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.is_empty() {
        return Err(EngineError::invalid_argument("DSRC_CODE must not be empty"));
    }
    if code.len() > MAX_CODE_LEN {
        return Err(EngineError::invalid_argument(format!(
            "DSRC_CODE '{code}' exceeds {MAX_CODE_LEN} characters"
        )));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(EngineError::invalid_argument(format!(
            "DSRC_CODE '{code}' contains invalid characters"
        )));
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(doc: &ConfigDocument) -> Vec<&str> {
        doc.data_sources().iter().map(|ds| ds.code.as_str()).collect()
    }

    #[test]
    fn template_contents() {
        let doc = ConfigDocument::template();
        assert_eq!(codes(&doc), vec!["TEST", "SEARCH"]);
        assert_eq!(doc.feature_types(), vec!["NAME", "ADDRESS", "PHONE", "EMAIL"]);
    }

    #[test]
    fn add_assigns_user_ids() {
        let mut doc = ConfigDocument::template();
        assert_eq!(doc.add_data_source(r#"{"DSRC_CODE": "GO_TEST"}"#).unwrap(), 1001);
        assert_eq!(doc.add_data_source(r#"{"DSRC_CODE": "crm"}"#).unwrap(), 1002);
        assert_eq!(codes(&doc), vec!["TEST", "SEARCH", "GO_TEST", "CRM"]);
    }

    #[test]
    fn add_with_explicit_id() {
        let mut doc = ConfigDocument::template();
        assert_eq!(
            doc.add_data_source(r#"{"DSRC_CODE":"A","DSRC_ID":5000}"#).unwrap(),
            5000
        );
        assert_eq!(doc.add_data_source(r#"{"DSRC_CODE":"B"}"#).unwrap(), 5001);

        let err = doc
            .add_data_source(r#"{"DSRC_CODE":"C","DSRC_ID":1}"#)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn add_after_max_id_is_a_limit() {
        let mut doc = ConfigDocument::template();
        let max = format!(r#"{{"DSRC_CODE":"MAXED","DSRC_ID":{}}}"#, i64::MAX);
        assert_eq!(doc.add_data_source(&max).unwrap(), i64::MAX);

        let err = doc.add_data_source(r#"{"DSRC_CODE":"NEXT"}"#).unwrap_err();
        assert!(matches!(err, EngineError::ResourceLimit(_)));
        assert_eq!(err.code(), crate::error::codes::RESOURCE_LIMIT);
        assert!(doc.data_source("NEXT").is_none());

        // An explicit ID still works
        assert_eq!(
            doc.add_data_source(r#"{"DSRC_CODE":"NEXT","DSRC_ID":7}"#).unwrap(),
            7
        );

        // Same through a reloaded document
        let mut copy = ConfigDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert!(matches!(
            copy.add_data_source(r#"{"DSRC_CODE":"LATER"}"#).unwrap_err(),
            EngineError::ResourceLimit(_)
        ));
    }

    #[test]
    fn add_duplicate_is_rejected() {
        let mut doc = ConfigDocument::template();
        doc.add_data_source(r#"{"DSRC_CODE": "GO_TEST"}"#).unwrap();
        let err = doc.add_data_source(r#"{"DSRC_CODE": " go_test "}"#).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateDataSource(code) if code == "GO_TEST"));
    }

    #[test]
    fn add_rejects_bad_input() {
        let mut doc = ConfigDocument::template();
        assert!(matches!(
            doc.add_data_source("{}").unwrap_err(),
            EngineError::InvalidJson(_)
        ));
        assert!(matches!(
            doc.add_data_source(r#"{"DSRC_CODE": ""}"#).unwrap_err(),
            EngineError::InvalidArgument(_)
        ));
        assert!(matches!(
            doc.add_data_source(r#"{"DSRC_CODE": "HAS SPACE"}"#).unwrap_err(),
            EngineError::InvalidArgument(_)
        ));
        let long = format!(r#"{{"DSRC_CODE": "{}"}}"#, "X".repeat(MAX_CODE_LEN + 1));
        assert!(doc.add_data_source(&long).is_err());
    }

    #[test]
    fn delete_present_and_absent() {
        let mut doc = ConfigDocument::template();
        doc.add_data_source(r#"{"DSRC_CODE": "GO_TEST"}"#).unwrap();
        assert!(doc.delete_data_source(r#"{"DSRC_CODE": "GO_TEST"}"#).unwrap());
        assert!(!doc.delete_data_source(r#"{"DSRC_CODE": "GO_TEST"}"#).unwrap());
        assert_eq!(codes(&doc), vec!["TEST", "SEARCH"]);
    }

    #[test]
    fn save_load_preserves_unknown_sections() {
        let mut doc = ConfigDocument::template();
        doc.add_data_source(r#"{"DSRC_CODE": "GO_TEST"}"#).unwrap();
        let saved = doc.to_json().unwrap();

        let loaded = ConfigDocument::from_json(&saved).unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(loaded.to_json().unwrap(), saved);

        let custom = r#"{"G2_CONFIG":{"CFG_DSRC":[],"SYS_CUSTOM":{"K":[1,2]}}}"#;
        let loaded = ConfigDocument::from_json(custom).unwrap();
        assert!(loaded.to_json().unwrap().contains(r#""SYS_CUSTOM":{"K":[1,2]}"#));
    }

    #[test]
    fn load_rejects_duplicates() {
        let json = r#"{"G2_CONFIG":{"CFG_DSRC":[
            {"DSRC_ID":1,"DSRC_CODE":"A"},{"DSRC_ID":2,"DSRC_CODE":"A"}]}}"#;
        assert!(ConfigDocument::from_json(json).is_err());
        assert!(ConfigDocument::from_json(r#"{"OTHER":{}}"#).is_err());
    }

    #[test]
    fn list_json_shape() {
        let doc = ConfigDocument::template();
        let list: Value = serde_json::from_str(&doc.list_json()).unwrap();
        assert_eq!(list["DATA_SOURCES"][0]["DSRC_CODE"], "TEST");
        assert_eq!(list["DATA_SOURCES"][1]["DSRC_ID"], 2);
    }
}
