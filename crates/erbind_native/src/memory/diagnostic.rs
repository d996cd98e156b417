//! In-memory diagnostic module.

use super::{ready, DEFAULT_HANDLE_LIMIT};
use crate::error::{EngineError, EngineResult, ExceptionState, NativeResult, ReturnCode};
use crate::module::{DiagnosticModule, NativeHandle, NativeModule};
use crate::repository::{Record, Repository, SharedRepository};
use crate::settings::{DatabaseUrl, EngineSettings};
use crate::system::SystemInfo;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::debug;

/// Rows kept by the `check_db_perf` scratch table; older keys are overwritten.
const PERF_SCRATCH_ROWS: u64 = 10_000;

/// Diagnostic module reading a shared repository.
///
/// Entity list cursors snapshot the matching entity IDs when opened and build
/// each row only when it is fetched.
#[derive(Debug)]
pub struct MemoryDiagnosticModule {
    exception: ExceptionState,
    state: Option<DiagnosticState>,
    cursor_limit: usize,
}

#[derive(Debug)]
struct DiagnosticState {
    module_name: String,
    verbose: bool,
    database: DatabaseUrl,
    repository: SharedRepository,
    config_id: i64,
    cursors: HashMap<NativeHandle, EntityCursor>,
    next_handle: NativeHandle,
}

#[derive(Debug)]
struct EntityCursor {
    pending: VecDeque<i64>,
    exhausted: bool,
}

/// Input of `find_entities_by_feature_ids`.
#[derive(Debug, Deserialize)]
struct FeatureQuery {
    #[serde(rename = "ENTITY_ID")]
    entity_id: i64,
    #[serde(rename = "LIB_FEAT_IDS")]
    lib_feat_ids: Vec<i64>,
}

impl DiagnosticState {
    fn trace(&self, op: &str) {
        if self.verbose {
            debug!(module = %self.module_name, config_id = self.config_id, op, "diagnostic call");
        }
    }
}

impl MemoryDiagnosticModule {
    /// Creates an uninitialized module.
    pub fn new() -> Self {
        Self {
            exception: ExceptionState::new(),
            state: None,
            cursor_limit: DEFAULT_HANDLE_LIMIT,
        }
    }

    /// Sets the maximum number of open entity list cursors.
    #[must_use]
    pub fn with_cursor_limit(mut self, limit: usize) -> Self {
        self.cursor_limit = limit;
        self
    }

    /// Returns the active configuration ID, if initialized.
    pub fn active_config_id(&self) -> Option<i64> {
        self.state.as_ref().map(|s| s.config_id)
    }

    /// Returns the number of open entity list cursors.
    pub fn open_cursors(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.cursors.len())
    }

    fn open(
        module_name: &str,
        ini_params: &str,
        config_id: Option<i64>,
        verbose: bool,
    ) -> EngineResult<DiagnosticState> {
        let settings = EngineSettings::parse(ini_params)?;
        let database = settings.database()?;
        let repository = Repository::open(&database)?;
        let config_id = {
            let repo = repository.read();
            match config_id {
                Some(id) if repo.config(id).is_none() => {
                    return Err(EngineError::UnknownConfigId(id))
                }
                Some(id) => id,
                None => repo.default_config_id(),
            }
        };
        if verbose {
            debug!(module = %module_name, %database, config_id, "diagnostic module initialized");
        }
        Ok(DiagnosticState {
            module_name: module_name.to_string(),
            verbose,
            database,
            repository,
            config_id,
            cursors: HashMap::new(),
            next_handle: 0,
        })
    }

    fn init_state(
        &mut self,
        module_name: &str,
        ini_params: &str,
        config_id: Option<i64>,
        verbose: bool,
    ) -> NativeResult<()> {
        let result = Self::open(module_name, ini_params, config_id, verbose);
        self.state = Some(self.exception.capture(result)?);
        Ok(())
    }

    fn query<T>(
        &mut self,
        op: &str,
        f: impl FnOnce(&mut DiagnosticState) -> EngineResult<T>,
    ) -> NativeResult<T> {
        let result = ready(&mut self.state).and_then(|s| {
            s.trace(op);
            f(s)
        });
        self.exception.capture(result)
    }
}

impl Default for MemoryDiagnosticModule {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeModule for MemoryDiagnosticModule {
    fn init(&mut self, module_name: &str, ini_params: &str, verbose: bool) -> NativeResult<()> {
        self.init_state(module_name, ini_params, None, verbose)
    }

    fn destroy(&mut self) -> NativeResult<()> {
        let result = self.state.take().ok_or(EngineError::NotInitialized);
        let state = self.exception.capture(result)?;
        if state.verbose {
            debug!(
                module = %state.module_name,
                released = state.cursors.len(),
                "diagnostic module destroyed"
            );
        }
        Ok(())
    }

    fn last_exception(&self) -> String {
        self.exception.message().to_string()
    }

    fn last_exception_code(&self) -> ReturnCode {
        self.exception.code()
    }

    fn clear_last_exception(&mut self) {
        self.exception.clear();
    }
}

impl DiagnosticModule for MemoryDiagnosticModule {
    fn init_with_config_id(
        &mut self,
        module_name: &str,
        ini_params: &str,
        config_id: i64,
        verbose: bool,
    ) -> NativeResult<()> {
        self.init_state(module_name, ini_params, Some(config_id), verbose)
    }

    fn reinit(&mut self, config_id: i64) -> NativeResult<()> {
        self.query("reinit", |s| {
            if s.repository.read().config(config_id).is_none() {
                return Err(EngineError::UnknownConfigId(config_id));
            }
            s.config_id = config_id;
            Ok(())
        })
    }

    fn check_db_perf(&mut self, seconds_to_run: i32) -> NativeResult<String> {
        self.query("check_db_perf", |_| {
            let seconds = u64::try_from(seconds_to_run).map_err(|_| {
                EngineError::invalid_argument(format!(
                    "seconds to run must not be negative, got {seconds_to_run}"
                ))
            })?;
            let budget = Duration::from_secs(seconds);
            let start = Instant::now();
            let mut scratch: HashMap<u64, String> = HashMap::new();
            let mut inserted: u64 = 0;
            loop {
                scratch.insert(inserted % PERF_SCRATCH_ROWS, format!("PERF-{inserted}"));
                inserted += 1;
                if start.elapsed() >= budget {
                    break;
                }
            }
            Ok(json!({
                "numRecordsInserted": inserted,
                "insertTime": start.elapsed().as_millis() as u64,
            })
            .to_string())
        })
    }

    fn get_available_memory(&mut self) -> NativeResult<i64> {
        self.query("get_available_memory", |_| {
            Ok(saturate(SystemInfo::current()?.available_memory))
        })
    }

    fn get_total_system_memory(&mut self) -> NativeResult<i64> {
        self.query("get_total_system_memory", |_| {
            Ok(saturate(SystemInfo::current()?.total_memory))
        })
    }

    fn get_physical_cores(&mut self) -> NativeResult<i32> {
        self.query("get_physical_cores", |_| {
            Ok(i32::try_from(SystemInfo::current()?.physical_cores).unwrap_or(i32::MAX))
        })
    }

    fn get_logical_cores(&mut self) -> NativeResult<i32> {
        self.query("get_logical_cores", |_| {
            Ok(i32::try_from(SystemInfo::current()?.logical_cores).unwrap_or(i32::MAX))
        })
    }

    fn get_db_info(&mut self) -> NativeResult<String> {
        self.query("get_db_info", |s| {
            let repo = s.repository.read();
            Ok(json!({
                "DATABASE_URL": s.database.to_string(),
                "DATABASE_TYPE": s.database.kind(),
                "ACTIVE_CONFIG_ID": s.config_id,
                "RECORD_COUNT": repo.records().len(),
                "ENTITY_COUNT": repo.entity_ids().len(),
            })
            .to_string())
        })
    }

    fn get_data_source_counts(&mut self) -> NativeResult<String> {
        self.query("get_data_source_counts", |s| {
            let repo = s.repository.read();
            let config = repo
                .config(s.config_id)
                .ok_or(EngineError::UnknownConfigId(s.config_id))?;
            let counts: Vec<Value> = config
                .data_sources()
                .iter()
                .map(|ds| {
                    let records: Vec<&Record> = repo
                        .records()
                        .iter()
                        .filter(|r| r.data_source == ds.code)
                        .collect();
                    let entities: BTreeSet<i64> = records.iter().map(|r| r.entity_id).collect();
                    json!({
                        "DSRC_ID": ds.id,
                        "DSRC_CODE": ds.code,
                        "RECORD_COUNT": records.len(),
                        "ENTITY_COUNT": entities.len(),
                    })
                })
                .collect();
            Ok(json!({ "DATA_SOURCE_COUNTS": counts }).to_string())
        })
    }

    fn get_entity_details(
        &mut self,
        entity_id: i64,
        include_internal_features: bool,
    ) -> NativeResult<String> {
        self.query("get_entity_details", |s| {
            let repo = s.repository.read();
            require_entity(&repo, entity_id)?;

            let mut entity = Map::new();
            entity.insert("ENTITY_ID".into(), json!(entity_id));
            entity.insert("ENTITY_SIZE".into(), json!(repo.entity_size(entity_id)));
            entity.insert("RECORDS".into(), records_json(&repo.entity_records(entity_id)));
            if include_internal_features {
                let features: Vec<Value> = repo
                    .entity_features(entity_id)
                    .into_iter()
                    .map(|id| feature_json(&repo, id))
                    .collect();
                entity.insert("FEATURES".into(), Value::Array(features));
            }

            let related: Vec<Value> = repo
                .related(entity_id)
                .into_iter()
                .map(|(rel_id, rel)| {
                    let other = if rel.entity_a == entity_id {
                        rel.entity_b
                    } else {
                        rel.entity_a
                    };
                    json!({
                        "ENTITY_ID": other,
                        "RELATIONSHIP_ID": rel_id,
                        "MATCH_KEY": rel.match_key,
                        "MATCH_LEVEL": rel.match_level,
                    })
                })
                .collect();

            Ok(json!({
                "RESOLVED_ENTITY": Value::Object(entity),
                "RELATED_ENTITIES": related,
            })
            .to_string())
        })
    }

    fn get_entity_resume(&mut self, entity_id: i64) -> NativeResult<String> {
        self.query("get_entity_resume", |s| {
            let repo = s.repository.read();
            require_entity(&repo, entity_id)?;

            let related: Vec<Value> = repo
                .related(entity_id)
                .into_iter()
                .map(|(_, rel)| {
                    let other = if rel.entity_a == entity_id {
                        rel.entity_b
                    } else {
                        rel.entity_a
                    };
                    json!({
                        "ENTITY_ID": other,
                        "MATCH_KEY": rel.match_key,
                        "MATCH_LEVEL": rel.match_level,
                        "RECORDS": records_json(&repo.entity_records(other)),
                    })
                })
                .collect();

            Ok(json!({
                "RESOLVED_ENTITY": {
                    "ENTITY_ID": entity_id,
                    "RECORDS": records_json(&repo.entity_records(entity_id)),
                },
                "RELATED_ENTITIES": related,
            })
            .to_string())
        })
    }

    fn get_relationship_details(
        &mut self,
        relationship_id: i64,
        include_internal_features: bool,
    ) -> NativeResult<String> {
        self.query("get_relationship_details", |s| {
            if relationship_id <= 0 {
                return Err(EngineError::invalid_argument(format!(
                    "relationship ID must be positive, got {relationship_id}"
                )));
            }
            let repo = s.repository.read();
            let rel = repo
                .relationship(relationship_id)
                .ok_or(EngineError::unknown("relationship", relationship_id))?;

            let mut result = Map::new();
            result.insert(
                "RELATIONSHIP".into(),
                json!({
                    "RELATIONSHIP_ID": relationship_id,
                    "ENTITY_IDS": [rel.entity_a, rel.entity_b],
                    "MATCH_KEY": rel.match_key,
                    "MATCH_LEVEL": rel.match_level,
                }),
            );
            if include_internal_features {
                let a = repo.entity_features(rel.entity_a);
                let b = repo.entity_features(rel.entity_b);
                let shared: Vec<Value> = a
                    .intersection(&b)
                    .map(|id| feature_json(&repo, *id))
                    .collect();
                result.insert("SHARED_FEATURES".into(), Value::Array(shared));
            }
            Ok(Value::Object(result).to_string())
        })
    }

    fn get_entity_size_breakdown(
        &mut self,
        minimum_entity_size: i32,
        include_internal_features: bool,
    ) -> NativeResult<String> {
        self.query("get_entity_size_breakdown", |s| {
            let minimum = usize::try_from(minimum_entity_size).map_err(|_| {
                EngineError::invalid_argument(format!(
                    "minimum entity size must not be negative, got {minimum_entity_size}"
                ))
            })?;
            let repo = s.repository.read();

            let mut by_size: BTreeMap<usize, Vec<i64>> = BTreeMap::new();
            for entity_id in repo.entity_ids() {
                let size = repo.entity_size(entity_id);
                if size >= minimum {
                    by_size.entry(size).or_default().push(entity_id);
                }
            }

            let sizes: Vec<Value> = by_size
                .into_iter()
                .map(|(size, entities)| {
                    let mut row = Map::new();
                    row.insert("ENTITY_SIZE".into(), json!(size));
                    row.insert("ENTITY_COUNT".into(), json!(entities.len()));
                    if include_internal_features {
                        let mut types: BTreeMap<String, usize> = BTreeMap::new();
                        for entity_id in &entities {
                            for feat_id in repo.entity_features(*entity_id) {
                                if let Some(feature) = repo.feature(feat_id) {
                                    *types.entry(feature.feature_type.clone()).or_default() += 1;
                                }
                            }
                        }
                        row.insert("FEATURE_TYPES".into(), json!(types));
                    }
                    Value::Object(row)
                })
                .collect();

            Ok(json!({ "ENTITY_SIZES": sizes }).to_string())
        })
    }

    fn get_feature(&mut self, lib_feat_id: i64) -> NativeResult<String> {
        self.query("get_feature", |s| {
            if lib_feat_id <= 0 {
                return Err(EngineError::invalid_argument(format!(
                    "feature ID must be positive, got {lib_feat_id}"
                )));
            }
            let repo = s.repository.read();
            if repo.feature(lib_feat_id).is_none() {
                return Err(EngineError::unknown("feature", lib_feat_id));
            }
            let mut feature = feature_json(&repo, lib_feat_id);
            feature["ENTITY_COUNT"] = json!(repo.entities_with_feature(lib_feat_id).len());
            Ok(feature.to_string())
        })
    }

    fn get_generic_features(
        &mut self,
        feature_type: &str,
        maximum_estimated_count: i32,
    ) -> NativeResult<String> {
        self.query("get_generic_features", |s| {
            let feature_type = feature_type.trim().to_ascii_uppercase();
            if feature_type.is_empty() {
                return Err(EngineError::invalid_argument("feature type must not be empty"));
            }
            let maximum = usize::try_from(maximum_estimated_count).map_err(|_| {
                EngineError::invalid_argument(format!(
                    "maximum estimated count must not be negative, got {maximum_estimated_count}"
                ))
            })?;
            let repo = s.repository.read();

            let generic: Vec<Value> = repo
                .features()
                .iter()
                .filter(|(_, f)| f.feature_type == feature_type)
                .filter_map(|(id, f)| {
                    let count = repo.entities_with_feature(*id).len();
                    (count > maximum).then(|| {
                        json!({
                            "LIB_FEAT_ID": id,
                            "FEAT_DESC": f.value,
                            "ENTITY_COUNT": count,
                        })
                    })
                })
                .collect();

            Ok(json!({ "FTYPE_CODE": feature_type, "GENERIC_FEATURES": generic }).to_string())
        })
    }

    fn get_mapping_statistics(&mut self, include_internal_features: bool) -> NativeResult<String> {
        self.query("get_mapping_statistics", |s| {
            let repo = s.repository.read();

            #[derive(Default)]
            struct Mapping {
                records: usize,
                features: usize,
                unique: BTreeSet<i64>,
            }

            let mut stats: BTreeMap<(String, String), Mapping> = BTreeMap::new();
            for record in repo.records() {
                let mut seen_types = BTreeSet::new();
                for feat_id in &record.features {
                    let Some(feature) = repo.feature(*feat_id) else {
                        continue;
                    };
                    let entry = stats
                        .entry((record.data_source.clone(), feature.feature_type.clone()))
                        .or_default();
                    entry.features += 1;
                    entry.unique.insert(*feat_id);
                    if seen_types.insert(feature.feature_type.clone()) {
                        entry.records += 1;
                    }
                }
            }

            let rows: Vec<Value> = stats
                .into_iter()
                .map(|((data_source, feature_type), m)| {
                    let mut row = Map::new();
                    row.insert("DATA_SOURCE".into(), json!(data_source));
                    row.insert("FTYPE_CODE".into(), json!(feature_type));
                    row.insert("RECORD_COUNT".into(), json!(m.records));
                    row.insert("FEATURE_COUNT".into(), json!(m.features));
                    row.insert("UNIQUE_COUNT".into(), json!(m.unique.len()));
                    if include_internal_features {
                        row.insert("LIB_FEAT_IDS".into(), json!(m.unique));
                    }
                    Value::Object(row)
                })
                .collect();

            Ok(json!({ "MAPPING_STATISTICS": rows }).to_string())
        })
    }

    fn get_resolution_statistics(&mut self) -> NativeResult<String> {
        self.query("get_resolution_statistics", |s| {
            let repo = s.repository.read();
            let sizes: Vec<usize> = repo
                .entity_ids()
                .into_iter()
                .map(|id| repo.entity_size(id))
                .collect();

            let mut match_levels: BTreeMap<String, usize> = BTreeMap::new();
            for rel in repo.relationships().values() {
                *match_levels.entry(rel.match_level.to_string()).or_default() += 1;
            }

            Ok(json!({
                "RESOLUTION_STATISTICS": {
                    "TOTAL_RECORDS": repo.records().len(),
                    "TOTAL_ENTITIES": sizes.len(),
                    "SINGLETON_ENTITIES": sizes.iter().filter(|n| **n == 1).count(),
                    "MULTI_RECORD_ENTITIES": sizes.iter().filter(|n| **n > 1).count(),
                    "LARGEST_ENTITY_SIZE": sizes.iter().copied().max().unwrap_or(0),
                    "TOTAL_RELATIONSHIPS": repo.relationships().len(),
                    "MATCH_LEVELS": match_levels,
                }
            })
            .to_string())
        })
    }

    fn find_entities_by_feature_ids(&mut self, features: &str) -> NativeResult<String> {
        self.query("find_entities_by_feature_ids", |s| {
            let query: FeatureQuery = serde_json::from_str(features)?;
            if query.entity_id <= 0 {
                return Err(EngineError::invalid_argument(format!(
                    "entity ID must be positive, got {}",
                    query.entity_id
                )));
            }
            let repo = s.repository.read();
            if let Some(missing) = query
                .lib_feat_ids
                .iter()
                .find(|id| repo.feature(**id).is_none())
            {
                return Err(EngineError::unknown("feature", *missing));
            }

            let mut matches: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
            for feat_id in &query.lib_feat_ids {
                for entity_id in repo.entities_with_feature(*feat_id) {
                    if entity_id != query.entity_id {
                        matches.entry(entity_id).or_default().insert(*feat_id);
                    }
                }
            }

            let entities: Vec<Value> = matches
                .into_iter()
                .map(|(entity_id, shared)| json!({"ENTITY_ID": entity_id, "LIB_FEAT_IDS": shared}))
                .collect();
            Ok(json!({ "ENTITIES": entities }).to_string())
        })
    }

    fn get_entity_list_by_size(&mut self, entity_size: i32) -> NativeResult<NativeHandle> {
        let limit = self.cursor_limit;
        self.query("get_entity_list_by_size", |s| {
            let minimum = usize::try_from(entity_size)
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    EngineError::invalid_argument(format!(
                        "entity size must be positive, got {entity_size}"
                    ))
                })?;
            if s.cursors.len() >= limit {
                return Err(EngineError::ResourceLimit(format!(
                    "{limit} entity list cursors already open"
                )));
            }

            let pending: VecDeque<i64> = {
                let repo = s.repository.read();
                repo.entity_ids()
                    .into_iter()
                    .filter(|id| repo.entity_size(*id) >= minimum)
                    .collect()
            };
            s.next_handle += 1;
            s.cursors.insert(
                s.next_handle,
                EntityCursor {
                    pending,
                    exhausted: false,
                },
            );
            Ok(s.next_handle)
        })
    }

    fn fetch_next_entity_by_size(&mut self, handle: NativeHandle) -> NativeResult<Option<String>> {
        self.query("fetch_next_entity_by_size", |s| {
            let cursor = s.cursors.get_mut(&handle).ok_or(EngineError::InvalidHandle {
                handle,
                reason: "unknown or closed entity list",
            })?;
            if cursor.exhausted {
                return Err(EngineError::InvalidHandle {
                    handle,
                    reason: "entity list is exhausted",
                });
            }

            let repo = s.repository.read();
            while let Some(entity_id) = cursor.pending.pop_front() {
                let records = repo.entity_records(entity_id);
                // Entities can disappear from a shared repository after the snapshot.
                if records.is_empty() {
                    continue;
                }
                let data_sources: BTreeSet<&str> =
                    records.iter().map(|r| r.data_source.as_str()).collect();
                return Ok(Some(
                    json!({
                        "RES_ENT_ID": entity_id,
                        "ENT_SIZE": records.len(),
                        "DATA_SOURCES": data_sources,
                    })
                    .to_string(),
                ));
            }
            cursor.exhausted = true;
            Ok(None)
        })
    }

    fn close_entity_list_by_size(&mut self, handle: NativeHandle) -> NativeResult<()> {
        self.query("close_entity_list_by_size", |s| {
            s.cursors
                .remove(&handle)
                .map(|_| ())
                .ok_or(EngineError::InvalidHandle {
                    handle,
                    reason: "unknown or closed entity list",
                })
        })
    }
}

fn saturate(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

fn require_entity(repo: &Repository, entity_id: i64) -> EngineResult<()> {
    if entity_id <= 0 {
        return Err(EngineError::invalid_argument(format!(
            "entity ID must be positive, got {entity_id}"
        )));
    }
    if repo.entity_size(entity_id) == 0 {
        return Err(EngineError::unknown("entity", entity_id));
    }
    Ok(())
}

fn records_json(records: &[&Record]) -> Value {
    Value::Array(
        records
            .iter()
            .map(|r| json!({"DATA_SOURCE": r.data_source, "RECORD_ID": r.record_id}))
            .collect(),
    )
}

fn feature_json(repo: &Repository, lib_feat_id: i64) -> Value {
    match repo.feature(lib_feat_id) {
        Some(f) => json!({
            "LIB_FEAT_ID": lib_feat_id,
            "FTYPE_CODE": f.feature_type,
            "FEAT_DESC": f.value,
        }),
        None => json!({ "LIB_FEAT_ID": lib_feat_id }),
    }
}
