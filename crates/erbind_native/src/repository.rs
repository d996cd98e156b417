//! Resolution repositories.
//!
//! A repository is what the engine's database holds: persisted configuration
//! documents, a feature library, records already resolved to entities, and
//! relationships between entities. The reference engine only reads resolution
//! results; it never resolves records itself.

use crate::document::ConfigDocument;
use crate::error::{EngineError, EngineResult};
use crate::settings::DatabaseUrl;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Arc, LazyLock};

/// Configuration ID registered for the template document in a new repository.
const TEMPLATE_CONFIG_ID: i64 = 1;

/// A repository shared between modules.
pub type SharedRepository = Arc<RwLock<Repository>>;

/// Named in-memory repositories, shared by every module in the process.
static MEMORY_REPOSITORIES: LazyLock<Mutex<HashMap<String, SharedRepository>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// A library feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// Feature type code (`NAME`, `PHONE`, ...).
    pub feature_type: String,
    /// Feature value.
    pub value: String,
}

/// A source record resolved to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Data source code.
    pub data_source: String,
    /// Record identifier within the data source.
    pub record_id: String,
    /// The entity the record resolved to.
    pub entity_id: i64,
    /// Library features of the record.
    pub features: Vec<i64>,
}

/// A relationship between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// The lower entity ID.
    pub entity_a: i64,
    /// The higher entity ID.
    pub entity_b: i64,
    /// Feature types that matched, e.g. `+NAME+PHONE`.
    pub match_key: String,
    /// Match level (1 resolved, 2 possible match, 3 possibly related).
    pub match_level: u8,
}

/// A resolution repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    configs: BTreeMap<i64, ConfigDocument>,
    default_config_id: i64,
    #[serde(default)]
    features: BTreeMap<i64, Feature>,
    #[serde(default)]
    records: Vec<Record>,
    #[serde(default)]
    relationships: BTreeMap<i64, Relationship>,
}

impl Repository {
    /// Creates an empty repository with the template configuration registered
    /// as the default.
    pub fn new() -> Self {
        let mut configs = BTreeMap::new();
        configs.insert(TEMPLATE_CONFIG_ID, ConfigDocument::template());
        Self {
            configs,
            default_config_id: TEMPLATE_CONFIG_ID,
            features: BTreeMap::new(),
            records: Vec::new(),
            relationships: BTreeMap::new(),
        }
    }

    /// Opens the repository a database URL points to.
    ///
    /// Memory repositories are shared: every open of the same name returns
    /// the same instance. File repositories are loaded into a fresh instance.
    pub fn open(url: &DatabaseUrl) -> EngineResult<SharedRepository> {
        match url {
            DatabaseUrl::Memory(name) => Ok(memory_repository(name)),
            DatabaseUrl::File(path) => Ok(Arc::new(RwLock::new(Self::load(path)?))),
        }
    }

    /// Loads a repository snapshot from a JSON file.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = fs::read_to_string(path)?;
        let repo: Self = serde_json::from_str(&text)?;
        if !repo.configs.contains_key(&repo.default_config_id) {
            return Err(EngineError::UnknownConfigId(repo.default_config_id));
        }
        Ok(repo)
    }

    /// Writes a repository snapshot to a JSON file.
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    // === Configurations ===

    /// Registers a configuration document and returns its ID.
    ///
    /// # Errors
    ///
    /// Returns `ResourceLimit` once the largest ID is `i64::MAX`.
    pub fn add_config(&mut self, doc: ConfigDocument) -> EngineResult<i64> {
        let id = next_key(&self.configs, TEMPLATE_CONFIG_ID, "configuration")?;
        self.configs.insert(id, doc);
        Ok(id)
    }

    /// Returns a registered configuration.
    pub fn config(&self, config_id: i64) -> Option<&ConfigDocument> {
        self.configs.get(&config_id)
    }

    /// Returns the default configuration ID.
    pub fn default_config_id(&self) -> i64 {
        self.default_config_id
    }

    /// Changes the default configuration ID.
    pub fn set_default_config_id(&mut self, config_id: i64) -> EngineResult<()> {
        if !self.configs.contains_key(&config_id) {
            return Err(EngineError::UnknownConfigId(config_id));
        }
        self.default_config_id = config_id;
        Ok(())
    }

    // === Loading resolved data ===

    /// Adds a feature to the library, reusing an identical one.
    ///
    /// # Errors
    ///
    /// Returns `ResourceLimit` once the largest feature ID is `i64::MAX`.
    pub fn add_feature(&mut self, feature_type: &str, value: &str) -> EngineResult<i64> {
        let feature_type = feature_type.trim().to_ascii_uppercase();
        if let Some((id, _)) = self
            .features
            .iter()
            .find(|(_, f)| f.feature_type == feature_type && f.value == value)
        {
            return Ok(*id);
        }
        let id = next_key(&self.features, 1, "feature")?;
        self.features.insert(
            id,
            Feature {
                feature_type,
                value: value.to_string(),
            },
        );
        Ok(id)
    }

    /// Adds or replaces a record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a non-positive entity ID, and
    /// `UnknownResource` for a feature missing from the library.
    pub fn add_record(
        &mut self,
        data_source: &str,
        record_id: &str,
        entity_id: i64,
        features: &[i64],
    ) -> EngineResult<()> {
        if entity_id <= 0 {
            return Err(EngineError::invalid_argument(format!(
                "entity ID must be positive, got {entity_id}"
            )));
        }
        if let Some(missing) = features.iter().find(|id| !self.features.contains_key(*id)) {
            return Err(EngineError::unknown("feature", *missing));
        }

        let data_source = data_source.trim().to_ascii_uppercase();
        self.records
            .retain(|r| !(r.data_source == data_source && r.record_id == record_id));
        self.records.push(Record {
            data_source,
            record_id: record_id.to_string(),
            entity_id,
            features: features.to_vec(),
        });
        Ok(())
    }

    /// Relates two existing entities and returns the relationship ID.
    pub fn add_relationship(
        &mut self,
        entity_a: i64,
        entity_b: i64,
        match_key: &str,
        match_level: u8,
    ) -> EngineResult<i64> {
        if entity_a == entity_b {
            return Err(EngineError::invalid_argument(
                "an entity cannot be related to itself",
            ));
        }
        for entity_id in [entity_a, entity_b] {
            if self.entity_size(entity_id) == 0 {
                return Err(EngineError::unknown("entity", entity_id));
            }
        }
        let id = next_key(&self.relationships, 1, "relationship")?;
        self.relationships.insert(
            id,
            Relationship {
                entity_a: entity_a.min(entity_b),
                entity_b: entity_a.max(entity_b),
                match_key: match_key.to_string(),
                match_level,
            },
        );
        Ok(id)
    }

    // === Queries ===

    /// Returns every record.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Returns the feature library.
    pub fn features(&self) -> &BTreeMap<i64, Feature> {
        &self.features
    }

    /// Returns every relationship.
    pub fn relationships(&self) -> &BTreeMap<i64, Relationship> {
        &self.relationships
    }

    /// Returns a library feature.
    pub fn feature(&self, lib_feat_id: i64) -> Option<&Feature> {
        self.features.get(&lib_feat_id)
    }

    /// Returns a relationship.
    pub fn relationship(&self, relationship_id: i64) -> Option<&Relationship> {
        self.relationships.get(&relationship_id)
    }

    /// Returns the IDs of every entity, ascending.
    pub fn entity_ids(&self) -> BTreeSet<i64> {
        self.records.iter().map(|r| r.entity_id).collect()
    }

    /// Returns the records of an entity.
    pub fn entity_records(&self, entity_id: i64) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|r| r.entity_id == entity_id)
            .collect()
    }

    /// Returns the number of records resolved to an entity.
    pub fn entity_size(&self, entity_id: i64) -> usize {
        self.records
            .iter()
            .filter(|r| r.entity_id == entity_id)
            .count()
    }

    /// Returns the distinct features of an entity.
    pub fn entity_features(&self, entity_id: i64) -> BTreeSet<i64> {
        self.records
            .iter()
            .filter(|r| r.entity_id == entity_id)
            .flat_map(|r| r.features.iter().copied())
            .collect()
    }

    /// Returns the relationships an entity takes part in.
    pub fn related(&self, entity_id: i64) -> Vec<(i64, &Relationship)> {
        self.relationships
            .iter()
            .filter(|(_, rel)| rel.entity_a == entity_id || rel.entity_b == entity_id)
            .map(|(id, rel)| (*id, rel))
            .collect()
    }

    /// Returns the entities having a feature.
    pub fn entities_with_feature(&self, lib_feat_id: i64) -> BTreeSet<i64> {
        self.records
            .iter()
            .filter(|r| r.features.contains(&lib_feat_id))
            .map(|r| r.entity_id)
            .collect()
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the ID after the largest key, or `first` for an empty map.
fn next_key<V>(map: &BTreeMap<i64, V>, first: i64, kind: &str) -> EngineResult<i64> {
    match map.keys().next_back() {
        None => Ok(first),
        Some(last) => last.checked_add(1).ok_or_else(|| {
            EngineError::ResourceLimit(format!("no {kind} ID left after {last}"))
        }),
    }
}

/// Returns the named in-memory repository, creating it on first use.
pub fn memory_repository(name: &str) -> SharedRepository {
    let mut repos = MEMORY_REPOSITORIES.lock();
    Arc::clone(
        repos
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(Repository::new()))),
    )
}

/// Forgets a named in-memory repository.
///
/// Modules already holding it keep their reference. Returns whether the name
/// was registered.
pub fn drop_memory_repository(name: &str) -> bool {
    MEMORY_REPOSITORIES.lock().remove(name).is_some()
}
