//! Diagnostic service.

use crate::entity_list::EntitiesBySize;
use crate::error::{BindError, BindResult, ErrorKind};
use crate::handle::{EntityListHandle, HandleTable};
use crate::session::{CancelToken, Session, SessionConfig, SessionState};
use erbind_native::{DiagnosticModule, MemoryDiagnosticModule, NativeHandle, ReturnCode};

/// An open entity list cursor.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntityCursor {
    native: NativeHandle,
    exhausted: bool,
}

/// Read-only introspection of a resolution repository through a native
/// diagnostic module.
///
/// All queries need an initialized session. JSON results are the engine's own
/// documents, returned unchanged.
#[derive(Debug)]
pub struct DiagnosticService<M = MemoryDiagnosticModule> {
    session: Session<M, EntityCursor>,
}

impl DiagnosticService<MemoryDiagnosticModule> {
    /// Creates a service over the in-process reference engine.
    pub fn new() -> Self {
        Self::with_module(MemoryDiagnosticModule::new())
    }
}

impl Default for DiagnosticService<MemoryDiagnosticModule> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: DiagnosticModule> DiagnosticService<M> {
    /// Creates a service over an uninitialized native module.
    pub fn with_module(module: M) -> Self {
        Self {
            session: Session::new(module),
        }
    }

    // === Lifecycle ===

    /// Initializes the session, bound to `config.config_id` when set and to
    /// the repository's default configuration otherwise.
    pub fn init(&self, config: &SessionConfig) -> BindResult<()> {
        self.session.open("diagnostic.init", config, |m, c| match c.config_id {
            Some(id) => {
                m.init_with_config_id(&c.module_name, &c.ini_params, id, c.verbose_logging)
            }
            None => m.init(&c.module_name, &c.ini_params, c.verbose_logging),
        })
    }

    /// Initializes the session bound to a persisted configuration.
    pub fn init_with_config_id(&self, config: &SessionConfig, config_id: i64) -> BindResult<()> {
        self.init(&config.clone().config_id(config_id))
    }

    /// Switches the active configuration.
    ///
    /// # Errors
    ///
    /// `ReinitFailure` if the engine rejects the ID; the previous
    /// configuration stays active.
    pub fn reinit(&self, config_id: i64) -> BindResult<()> {
        self.session.call("diagnostic.reinit", |r| {
            r.native_as(|_| ErrorKind::ReinitFailure, |m| m.reinit(config_id))?;
            if let Some(config) = r.config() {
                config.config_id = Some(config_id);
            }
            Ok(())
        })
    }

    /// Destroys the session; every open entity list becomes invalid.
    pub fn destroy(&self) -> BindResult<()> {
        self.session.destroy()
    }

    /// Returns the configuration ID the session is bound to, if one was given.
    pub fn active_config_id(&self) -> Option<i64> {
        self.session.config().and_then(|c| c.config_id)
    }

    // === System ===

    /// Runs a write benchmark for `seconds_to_run` seconds.
    pub fn check_db_perf(&self, seconds_to_run: i32) -> BindResult<String> {
        if seconds_to_run < 0 {
            return self.reject(
                "diagnostic.check_db_perf",
                "seconds to run must not be negative",
            );
        }
        self.session.call("diagnostic.check_db_perf", |r| {
            r.native(|m| m.check_db_perf(seconds_to_run))
        })
    }

    /// Returns the memory available to the engine, in bytes.
    pub fn get_available_memory(&self) -> BindResult<i64> {
        self.session.call("diagnostic.get_available_memory", |r| {
            positive("available memory", r.native(|m| m.get_available_memory())?)
        })
    }

    /// Returns the total system memory, in bytes.
    pub fn get_total_system_memory(&self) -> BindResult<i64> {
        self.session.call("diagnostic.get_total_system_memory", |r| {
            positive("total system memory", r.native(|m| m.get_total_system_memory())?)
        })
    }

    /// Returns the number of physical CPU cores.
    pub fn get_physical_cores(&self) -> BindResult<i32> {
        self.session.call("diagnostic.get_physical_cores", |r| {
            positive("physical cores", r.native(|m| m.get_physical_cores())?)
        })
    }

    /// Returns the number of logical CPU cores.
    pub fn get_logical_cores(&self) -> BindResult<i32> {
        self.session.call("diagnostic.get_logical_cores", |r| {
            positive("logical cores", r.native(|m| m.get_logical_cores())?)
        })
    }

    // === Repository ===

    /// Describes the repository database.
    pub fn get_db_info(&self) -> BindResult<String> {
        self.session
            .call("diagnostic.get_db_info", |r| r.native(|m| m.get_db_info()))
    }

    /// Returns record and entity counts per data source.
    pub fn get_data_source_counts(&self) -> BindResult<String> {
        self.session.call("diagnostic.get_data_source_counts", |r| {
            r.native(|m| m.get_data_source_counts())
        })
    }

    /// Returns the entity size histogram from `minimum_entity_size` up.
    pub fn get_entity_size_breakdown(
        &self,
        minimum_entity_size: i32,
        include_internal_features: bool,
    ) -> BindResult<String> {
        self.session.call("diagnostic.get_entity_size_breakdown", |r| {
            r.native(|m| {
                m.get_entity_size_breakdown(minimum_entity_size, include_internal_features)
            })
        })
    }

    /// Returns per data source, per feature type mapping counts.
    pub fn get_mapping_statistics(&self, include_internal_features: bool) -> BindResult<String> {
        self.session.call("diagnostic.get_mapping_statistics", |r| {
            r.native(|m| m.get_mapping_statistics(include_internal_features))
        })
    }

    /// Returns repository-wide resolution totals.
    pub fn get_resolution_statistics(&self) -> BindResult<String> {
        self.session.call("diagnostic.get_resolution_statistics", |r| {
            r.native(|m| m.get_resolution_statistics())
        })
    }

    // === Entities and features ===

    /// Describes an entity and its relationships.
    pub fn get_entity_details(
        &self,
        entity_id: i64,
        include_internal_features: bool,
    ) -> BindResult<String> {
        const OP: &str = "diagnostic.get_entity_details";
        if entity_id <= 0 {
            return self.reject(OP, format!("entity ID must be positive, got {entity_id}"));
        }
        self.session.call(OP, |r| {
            r.native(|m| m.get_entity_details(entity_id, include_internal_features))
        })
    }

    /// Summarizes an entity with its related entities' records.
    pub fn get_entity_resume(&self, entity_id: i64) -> BindResult<String> {
        const OP: &str = "diagnostic.get_entity_resume";
        if entity_id <= 0 {
            return self.reject(OP, format!("entity ID must be positive, got {entity_id}"));
        }
        self.session.call(OP, |r| r.native(|m| m.get_entity_resume(entity_id)))
    }

    /// Describes a relationship between two entities.
    pub fn get_relationship_details(
        &self,
        relationship_id: i64,
        include_internal_features: bool,
    ) -> BindResult<String> {
        const OP: &str = "diagnostic.get_relationship_details";
        if relationship_id <= 0 {
            return self.reject(
                OP,
                format!("relationship ID must be positive, got {relationship_id}"),
            );
        }
        self.session.call(OP, |r| {
            r.native(|m| m.get_relationship_details(relationship_id, include_internal_features))
        })
    }

    /// Describes a library feature.
    pub fn get_feature(&self, lib_feat_id: i64) -> BindResult<String> {
        const OP: &str = "diagnostic.get_feature";
        if lib_feat_id <= 0 {
            return self.reject(OP, format!("feature ID must be positive, got {lib_feat_id}"));
        }
        self.session.call(OP, |r| r.native(|m| m.get_feature(lib_feat_id)))
    }

    /// Lists features of `feature_type` shared by more than
    /// `maximum_estimated_count` entities.
    pub fn get_generic_features(
        &self,
        feature_type: &str,
        maximum_estimated_count: i32,
    ) -> BindResult<String> {
        self.session.call("diagnostic.get_generic_features", |r| {
            r.native(|m| m.get_generic_features(feature_type, maximum_estimated_count))
        })
    }

    /// Finds other entities sharing any of the listed features, given
    /// `{"ENTITY_ID": e, "LIB_FEAT_IDS": [...]}`.
    pub fn find_entities_by_feature_ids(&self, features: &str) -> BindResult<String> {
        self.session.call("diagnostic.find_entities_by_feature_ids", |r| {
            r.native(|m| m.find_entities_by_feature_ids(features))
        })
    }

    // === Entity list by size ===

    /// Opens a cursor over entities with at least `entity_size` records.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a threshold of zero or less.
    pub fn get_entity_list_by_size(&self, entity_size: i32) -> BindResult<EntityListHandle> {
        const OP: &str = "diagnostic.get_entity_list_by_size";
        if entity_size <= 0 {
            return self.reject(OP, format!("entity size must be positive, got {entity_size}"));
        }
        self.session.call(OP, |r| {
            let native = r.native(|m| m.get_entity_list_by_size(entity_size))?;
            let token = r.handles().insert(EntityCursor {
                native,
                exhausted: false,
            });
            Ok(EntityListHandle::from_raw(token))
        })
    }

    /// Returns the next entity row, or `None` once the list is exhausted.
    ///
    /// # Errors
    ///
    /// `InvalidHandle` for a closed handle or after `None` was returned.
    pub fn fetch_next_entity_by_size(
        &self,
        handle: EntityListHandle,
    ) -> BindResult<Option<String>> {
        self.session.call("diagnostic.fetch_next_entity_by_size", |r| {
            let cursor = lookup(r.handles(), handle)?;
            if cursor.exhausted {
                return Err(BindError::binding(
                    ErrorKind::InvalidHandle,
                    format!("entity list {handle} is exhausted"),
                ));
            }
            let row = r.native(|m| m.fetch_next_entity_by_size(cursor.native))?;
            if row.is_none() {
                if let Some(cursor) = r.handles().get_mut(handle.as_raw()) {
                    cursor.exhausted = true;
                }
            }
            Ok(row)
        })
    }

    /// Releases an entity list cursor.
    pub fn close_entity_list_by_size(&self, handle: EntityListHandle) -> BindResult<()> {
        self.session.call("diagnostic.close_entity_list_by_size", |r| {
            let cursor = r
                .handles()
                .remove(handle.as_raw())
                .ok_or_else(|| BindError::invalid_handle(handle.as_raw()))?;
            r.native(|m| m.close_entity_list_by_size(cursor.native))
        })
    }

    /// Iterates over the entities with at least `entity_size` records.
    ///
    /// The cursor is closed when the iterator is dropped.
    pub fn entities_by_size(&self, entity_size: i32) -> BindResult<EntitiesBySize<'_, M>> {
        let handle = self.get_entity_list_by_size(entity_size)?;
        Ok(EntitiesBySize::new(self, handle))
    }

    /// Closes a cursor without reporting failures.
    pub(crate) fn release_entity_list(&self, handle: EntityListHandle) {
        self.session.call_quiet(|r| {
            let Some(cursor) = r.handles().remove(handle.as_raw()) else {
                return Ok(());
            };
            r.native(|m| m.close_entity_list_by_size(cursor.native))
        });
    }

    // === Session ===

    /// Returns the session state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Returns the session's cancel token.
    pub fn cancel_token(&self) -> CancelToken {
        self.session.cancel_token()
    }

    /// Returns the number of open entity lists.
    pub fn open_handles(&self) -> usize {
        self.session.open_handles()
    }

    /// Returns the last failure message, empty if none.
    pub fn last_exception(&self) -> String {
        self.session.last_exception()
    }

    /// Returns the last failure code, zero if none.
    pub fn last_exception_code(&self) -> ReturnCode {
        self.session.last_exception_code()
    }

    /// Clears the last failure.
    pub fn clear_last_exception(&self) {
        self.session.clear_last_exception();
    }

    /// Fails an argument check through the session so it is recorded.
    fn reject<T>(&self, op: &'static str, message: impl Into<String>) -> BindResult<T> {
        let message = message.into();
        self.session.call(op, |_| Err(BindError::invalid_input(message)))
    }
}

fn lookup(
    handles: &mut HandleTable<EntityCursor>,
    handle: EntityListHandle,
) -> BindResult<EntityCursor> {
    handles
        .get(handle.as_raw())
        .copied()
        .ok_or_else(|| BindError::invalid_handle(handle.as_raw()))
}

/// Rejects a non-positive scalar from the engine.
fn positive<T>(what: &str, value: T) -> BindResult<T>
where
    T: Copy + PartialOrd + Default + std::fmt::Display,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(BindError::malformed_response(
            what,
            format!("expected a positive value, got {value}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SystemConfiguration;
    use erbind_native::{drop_memory_repository, memory_repository, ConfigDocument};

    struct Seeded {
        name: String,
        service: DiagnosticService,
    }

    impl Drop for Seeded {
        fn drop(&mut self) {
            drop_memory_repository(&self.name);
        }
    }

    /// Entities 1 (2 records), 2 (1 record), 3 (3 records); 1 and 2 related.
    fn seeded(name: &str) -> Seeded {
        {
            let repo = memory_repository(name);
            let mut repo = repo.write();
            let name_feat = repo.add_feature("NAME", "ANN LEE").unwrap();
            let phone = repo.add_feature("PHONE", "555-0199").unwrap();
            repo.add_record("TEST", "A1", 1, &[name_feat, phone]).unwrap();
            repo.add_record("SEARCH", "A2", 1, &[name_feat]).unwrap();
            repo.add_record("TEST", "B1", 2, &[phone]).unwrap();
            for n in 0..3 {
                repo.add_record("TEST", &format!("C{n}"), 3, &[]).unwrap();
            }
            repo.add_relationship(1, 2, "+PHONE", 3).unwrap();
        }
        let service = DiagnosticService::new();
        service
            .init(&SessionConfig::new(SystemConfiguration::simple(&format!(
                "memory://{name}"
            ))))
            .unwrap();
        Seeded {
            name: name.to_string(),
            service,
        }
    }

    #[test]
    fn uninitialized_service_rejects_everything() {
        let service = DiagnosticService::new();
        let kinds = [
            service.get_physical_cores().map(|_| ()).unwrap_err().kind,
            service.get_db_info().map(|_| ()).unwrap_err().kind,
            service.get_entity_list_by_size(1).map(|_| ()).unwrap_err().kind,
            service.reinit(1).unwrap_err().kind,
        ];
        assert!(kinds.iter().all(|k| *k == ErrorKind::NotInitialized));
    }

    #[test]
    fn system_scalars_are_positive() {
        let s = seeded("core-diag-system");
        assert!(s.service.get_physical_cores().unwrap() > 0);
        assert!(s.service.get_logical_cores().unwrap() > 0);
        assert!(s.service.get_available_memory().unwrap() > 0);
        assert!(s.service.get_total_system_memory().unwrap() > 0);
    }

    #[test]
    fn init_with_config_id_and_reinit() {
        let name = "core-diag-reinit";
        let second = memory_repository(name)
            .write()
            .add_config(ConfigDocument::template()).unwrap();
        let service = DiagnosticService::new();
        let config = SessionConfig::new(SystemConfiguration::simple(&format!("memory://{name}")));

        let err = service.init_with_config_id(&config, 99).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidConfig);
        assert_eq!(service.state(), SessionState::Uninitialized);

        service.init_with_config_id(&config, 1).unwrap();
        assert_eq!(service.active_config_id(), Some(1));

        let err = service.reinit(99).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReinitFailure);
        assert_eq!(service.active_config_id(), Some(1));
        assert!(service.get_db_info().unwrap().contains(r#""ACTIVE_CONFIG_ID":1"#));

        service.reinit(second).unwrap();
        assert_eq!(service.active_config_id(), Some(second));
        drop_memory_repository(name);
    }

    #[test]
    fn out_of_range_identifiers_are_invalid_input() {
        let s = seeded("core-diag-ids");
        for err in [
            s.service.get_entity_details(0, false).unwrap_err(),
            s.service.get_entity_resume(-4).unwrap_err(),
            s.service.get_feature(0).unwrap_err(),
            s.service.get_relationship_details(0, true).unwrap_err(),
            s.service.get_entity_details(404, false).unwrap_err(),
            s.service.check_db_perf(-1).unwrap_err(),
        ] {
            assert_eq!(err.kind, ErrorKind::InvalidInput, "{err}");
        }
        assert_ne!(s.service.last_exception(), "");
    }

    #[test]
    fn queries_pass_engine_json_through() {
        let s = seeded("core-diag-queries");
        assert!(s.service.get_entity_details(1, true).unwrap().contains("FEATURES"));
        assert!(s.service.get_entity_resume(2).unwrap().contains("RELATED_ENTITIES"));
        assert!(s.service.get_relationship_details(1, false).unwrap().contains("+PHONE"));
        assert!(s.service.get_feature(1).unwrap().contains("ANN LEE"));
        assert!(s.service.get_generic_features("PHONE", 1).unwrap().contains("555-0199"));
        assert!(s.service.get_data_source_counts().unwrap().contains("SEARCH"));
        assert!(s.service.get_entity_size_breakdown(1, false).unwrap().contains("ENTITY_SIZES"));
        assert!(s.service.get_mapping_statistics(false).unwrap().contains("MAPPING_STATISTICS"));
        assert!(s.service.get_resolution_statistics().unwrap().contains(r#""TOTAL_ENTITIES":3"#));
        let found = s
            .service
            .find_entities_by_feature_ids(r#"{"ENTITY_ID":2,"LIB_FEAT_IDS":[2]}"#)
            .unwrap();
        assert!(found.contains(r#""ENTITY_ID":1"#));
        assert!(s.service.check_db_perf(0).unwrap().contains("numRecordsInserted"));
    }

    #[test]
    fn entity_list_protocol() {
        let s = seeded("core-diag-list");
        let handle = s.service.get_entity_list_by_size(2).unwrap();

        let mut rows = Vec::new();
        while let Some(row) = s.service.fetch_next_entity_by_size(handle).unwrap() {
            rows.push(row);
        }
        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains(r#""RES_ENT_ID":1"#));

        let err = s.service.fetch_next_entity_by_size(handle).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidHandle);

        s.service.close_entity_list_by_size(handle).unwrap();
        let err = s.service.fetch_next_entity_by_size(handle).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidHandle);
        assert_eq!(
            s.service.close_entity_list_by_size(handle).unwrap_err().kind,
            ErrorKind::InvalidHandle
        );
    }

    #[test]
    fn threshold_must_be_positive() {
        let s = seeded("core-diag-threshold");
        let err = s.service.get_entity_list_by_size(0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(s.service.last_exception(), err.message);
    }

    #[test]
    fn destroy_invalidates_entity_lists() {
        let s = seeded("core-diag-destroy");
        let handle = s.service.get_entity_list_by_size(1).unwrap();
        s.service.destroy().unwrap();
        assert_eq!(
            s.service.fetch_next_entity_by_size(handle).unwrap_err().kind,
            ErrorKind::NotInitialized
        );
        s.service
            .init(&SessionConfig::new(SystemConfiguration::simple(
                "memory://core-diag-destroy",
            )))
            .unwrap();
        assert_eq!(
            s.service.fetch_next_entity_by_size(handle).unwrap_err().kind,
            ErrorKind::InvalidHandle
        );
    }
}
