//! Configuration service lifecycle across crates.

use erbind_core::{ConfigHandle, ConfigService, ErrorKind, SessionState};
use erbind_testkit::prelude::*;

const GO_TEST: &str = r#"{"DSRC_CODE": "GO_TEST"}"#;

#[test]
fn uninitialized_service_reports_not_initialized() {
    let service = ConfigService::new();
    let handle = ConfigHandle::from_raw(1 << 32);

    let kinds = [
        service.create().map(|_| ()).unwrap_err().kind,
        service.add_data_source(handle, GO_TEST).map(|_| ()).unwrap_err().kind,
        service.delete_data_source(handle, GO_TEST).unwrap_err().kind,
        service.list_data_sources(handle).map(|_| ()).unwrap_err().kind,
        service.save(handle).map(|_| ()).unwrap_err().kind,
        service.load("{}").map(|_| ()).unwrap_err().kind,
        service.close(handle).unwrap_err().kind,
        service.destroy().unwrap_err().kind,
    ];
    assert!(kinds.iter().all(|k| *k == ErrorKind::NotInitialized));
    assert_eq!(service.last_exception_code(), ErrorKind::NotInitialized.default_code());
    assert!(!service.last_exception().is_empty());
}

#[test]
fn go_test_add_list_delete() {
    with_config_service(|service| {
        let handle = service.create().unwrap();

        let ack = service.add_data_source(handle, GO_TEST).unwrap();
        let ack: serde_json::Value = serde_json::from_str(&ack).unwrap();
        assert!(ack["DSRC_ID"].as_i64().unwrap() > 0);

        let list = service.list_data_sources(handle).unwrap();
        assert!(list.contains("\"GO_TEST\""));

        service.delete_data_source(handle, GO_TEST).unwrap();
        let list = service.list_data_sources(handle).unwrap();
        assert!(!list.contains("GO_TEST"));

        // Absent code
        service.delete_data_source(handle, GO_TEST).unwrap();
        assert_eq!(service.last_exception(), "");

        service.close(handle).unwrap();
    });
}

#[test]
fn closed_handle_is_invalid_everywhere() {
    with_config_service(|service| {
        let handle = service.create().unwrap();
        service.close(handle).unwrap();

        let kinds = [
            service.add_data_source(handle, GO_TEST).map(|_| ()).unwrap_err().kind,
            service.delete_data_source(handle, GO_TEST).unwrap_err().kind,
            service.list_data_sources(handle).map(|_| ()).unwrap_err().kind,
            service.save(handle).map(|_| ()).unwrap_err().kind,
            service.close(handle).unwrap_err().kind,
        ];
        assert!(kinds.iter().all(|k| *k == ErrorKind::InvalidHandle));

        // A new handle does not revive the old token
        let fresh = service.create().unwrap();
        assert_ne!(fresh, handle);
        assert_eq!(service.save(handle).unwrap_err().kind, ErrorKind::InvalidHandle);
    });
}

#[test]
fn save_is_idempotent_and_load_round_trips() {
    with_config_service(|service| {
        let handle = service.create().unwrap();
        service
            .add_data_source(handle, &data_source_request("CUSTOMERS"))
            .unwrap();

        let first = service.save(handle).unwrap();
        let second = service.save(handle).unwrap();
        assert_eq!(first, second);

        let copy = service.load(&first).unwrap();
        assert_eq!(
            service.data_source_codes(copy).unwrap(),
            service.data_source_codes(handle).unwrap()
        );
        assert_eq!(service.save(copy).unwrap(), first);

        // Documents are independent
        service
            .add_data_source(copy, &data_source_request("WATCHLIST"))
            .unwrap();
        assert!(!service
            .data_source_codes(handle)
            .unwrap()
            .contains(&"WATCHLIST".to_string()));
    });
}

#[test]
fn bad_requests_are_invalid_input() {
    with_config_service(|service| {
        let handle = service.create().unwrap();
        for request in ["not json", r#"{"NAME":"X"}"#, r#"{"DSRC_CODE":""}"#] {
            let err = service.add_data_source(handle, request).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidInput, "{request}");
            assert_eq!(service.last_exception_code(), err.code);
        }

        service.add_data_source(handle, GO_TEST).unwrap();
        let err = service.add_data_source(handle, GO_TEST).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert!(service.last_exception().contains("GO_TEST"));
    });
}

#[test]
fn success_clears_previous_failure() {
    with_config_service(|service| {
        let handle = service.create().unwrap();
        service.add_data_source(handle, "{").unwrap_err();
        assert_ne!(service.last_exception_code(), 0);

        service.list_data_sources(handle).unwrap();
        assert_eq!(service.last_exception(), "");
        assert_eq!(service.last_exception_code(), 0);
    });
}

#[test]
fn clear_last_exception() {
    with_config_service(|service| {
        service.load("garbage").unwrap_err();
        assert!(!service.last_exception().is_empty());

        service.clear_last_exception();
        assert_eq!(service.last_exception(), "");
        assert_eq!(service.last_exception_code(), 0);
    });
}

#[test]
fn lifecycle_policies() {
    let repo = TestRepository::memory();
    let service = repo.config_service();

    let err = service.init(&repo.session_config()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyInitialized);
    assert_eq!(service.state(), SessionState::Ready);

    let handle = service.create().unwrap();
    service.destroy().unwrap();
    assert_eq!(service.state(), SessionState::Destroyed);
    assert_eq!(service.destroy().unwrap_err().kind, ErrorKind::NotInitialized);

    service.init(&repo.session_config()).unwrap();
    assert_eq!(service.save(handle).unwrap_err().kind, ErrorKind::InvalidHandle);
    assert_eq!(service.open_handles(), 0);
}

#[test]
fn cancellation_blocks_new_calls() {
    let repo = TestRepository::memory();
    let service = repo.config_service();
    let handle = service.create().unwrap();

    service.cancel_token().cancel();
    let err = service.save(handle).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert_eq!(service.last_exception_code(), err.code);

    service.destroy().unwrap();
}

#[test]
fn file_repository_sessions() {
    let repo = scenarios::resolved_file_repository();
    let service = repo.config_service();
    let handle = service.create().unwrap();
    assert!(service
        .data_source_codes(handle)
        .unwrap()
        .contains(&"TEST".to_string()));
}

#[test]
fn exhausted_data_source_ids_are_reported() {
    with_config_service(|service| {
        let handle = service.create().unwrap();
        let max = format!(r#"{{"DSRC_CODE":"MAXED","DSRC_ID":{}}}"#, i64::MAX);
        service.add_data_source(handle, &max).unwrap();

        let err = service
            .add_data_source(handle, &data_source_request("NEXT"))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ResourceExhausted);
        assert_eq!(service.last_exception_code(), 104);

        // The session and the document stay usable
        let codes = service.data_source_codes(handle).unwrap();
        assert!(codes.contains(&"MAXED".to_string()));
        assert!(!codes.contains(&"NEXT".to_string()));
        service.close(handle).unwrap();
    });
}
