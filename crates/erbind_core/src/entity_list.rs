//! Iterator adapter over an entity list cursor.

use crate::diagnostic::DiagnosticService;
use crate::error::{BindError, BindResult};
use crate::handle::EntityListHandle;
use erbind_native::DiagnosticModule;
use serde::{Deserialize, Serialize};

/// One row of an entity list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRow {
    /// Resolved entity ID.
    #[serde(rename = "RES_ENT_ID")]
    pub entity_id: i64,
    /// Number of records resolved to the entity.
    #[serde(rename = "ENT_SIZE")]
    pub size: usize,
    /// Data sources contributing records.
    #[serde(rename = "DATA_SOURCES", default)]
    pub data_sources: Vec<String>,
}

impl EntityRow {
    /// Parses a row returned by `fetch_next_entity_by_size`.
    pub fn parse(json: &str) -> BindResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| BindError::malformed_response("fetch_next_entity_by_size", e))
    }
}

/// Entities with at least a given number of records.
///
/// Created by [`DiagnosticService::entities_by_size`]. Yields one row per
/// entity; after the list is exhausted or a fetch fails the iterator is done.
/// The cursor is closed on drop.
///
/// ```rust
/// use erbind_core::{DiagnosticService, SessionConfig, SystemConfiguration};
///
/// let service = DiagnosticService::new();
/// service
///     .init(&SessionConfig::new(SystemConfiguration::simple("memory://entity-list-doc")))
///     .unwrap();
/// let rows: Vec<_> = service.entities_by_size(1).unwrap().collect();
/// assert!(rows.is_empty());
/// assert_eq!(service.open_handles(), 0);
/// ```
pub struct EntitiesBySize<'a, M: DiagnosticModule> {
    service: &'a DiagnosticService<M>,
    handle: Option<EntityListHandle>,
    done: bool,
}

impl<'a, M: DiagnosticModule> EntitiesBySize<'a, M> {
    pub(crate) fn new(service: &'a DiagnosticService<M>, handle: EntityListHandle) -> Self {
        Self {
            service,
            handle: Some(handle),
            done: false,
        }
    }

    /// Returns the cursor handle while it is open.
    pub fn handle(&self) -> Option<EntityListHandle> {
        self.handle
    }

    /// Closes the cursor, reporting any failure.
    pub fn close(mut self) -> BindResult<()> {
        match self.handle.take() {
            Some(handle) => self.service.close_entity_list_by_size(handle),
            None => Ok(()),
        }
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.service.release_entity_list(handle);
        }
    }
}

impl<M: DiagnosticModule> Iterator for EntitiesBySize<'_, M> {
    type Item = BindResult<EntityRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let handle = self.handle?;
        let next = self
            .service
            .fetch_next_entity_by_size(handle)
            .and_then(|row| row.map(|json| EntityRow::parse(&json)).transpose());
        match next {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                self.release();
                None
            }
            Err(err) => {
                self.done = true;
                self.release();
                Some(Err(err))
            }
        }
    }
}

impl<M: DiagnosticModule> Drop for EntitiesBySize<'_, M> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<M: DiagnosticModule> std::fmt::Debug for EntitiesBySize<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitiesBySize")
            .field("handle", &self.handle)
            .field("done", &self.done)
            .finish()
    }
}
