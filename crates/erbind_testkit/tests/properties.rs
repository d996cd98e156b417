//! Property tests over the configuration service.

use erbind_core::ErrorKind;
use erbind_testkit::prelude::*;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn codes_track_a_model(ops in config_ops_strategy(24)) {
        let repo = TestRepository::memory();
        let service = repo.config_service();
        let handle = service.create().unwrap();
        let mut model = service.data_source_codes(handle).unwrap();

        for op in ops {
            match op {
                ConfigOp::Add(code) => {
                    let result = service.add_data_source(handle, &data_source_request(&code));
                    if model.contains(&code) {
                        prop_assert_eq!(result.unwrap_err().kind, ErrorKind::InvalidInput);
                    } else {
                        prop_assert!(result.is_ok());
                        model.push(code);
                    }
                }
                ConfigOp::Delete(code) => {
                    service
                        .delete_data_source(handle, &data_source_request(&code))
                        .unwrap();
                    model.retain(|c| *c != code);
                }
            }
        }

        prop_assert_eq!(service.data_source_codes(handle).unwrap(), model);
    }

    #[test]
    fn save_load_preserves_codes(codes in distinct_codes_strategy(10)) {
        let repo = TestRepository::memory();
        let service = repo.config_service();
        let handle = service.create().unwrap();
        for code in &codes {
            // Template codes may be generated; duplicates are rejected
            let _ = service.add_data_source(handle, &data_source_request(code));
        }

        let saved = service.save(handle).unwrap();
        let copy = service.load(&saved).unwrap();
        prop_assert_eq!(
            service.data_source_codes(copy).unwrap(),
            service.data_source_codes(handle).unwrap()
        );
        prop_assert_eq!(service.save(copy).unwrap(), saved);
    }

    #[test]
    fn invalid_codes_are_rejected(code in invalid_code_strategy()) {
        with_config_service(|service| {
            let handle = service.create().unwrap();
            let before = service.save(handle).unwrap();
            let err = service
                .add_data_source(handle, &data_source_request(&code))
                .unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidInput);
            assert_eq!(service.last_exception_code(), err.code);
            assert_eq!(service.save(handle).unwrap(), before);
        });
    }

    #[test]
    fn non_positive_ids_are_invalid_input(id in non_positive_id_strategy()) {
        with_diagnostic_service(|service| {
            let err = service.get_entity_details(id, false).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidInput);
            assert_eq!(service.get_feature(id).unwrap_err().kind, ErrorKind::InvalidInput);
        });
    }
}
