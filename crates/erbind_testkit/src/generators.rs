//! Property-based test generators using proptest.

use erbind_native::MAX_CODE_LEN;
use proptest::prelude::*;

/// Strategy for generating valid data source codes.
pub fn data_source_code_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex(&format!("[A-Z][A-Z0-9_]{{0,{}}}", MAX_CODE_LEN - 1))
        .expect("Invalid regex")
}

/// Strategy for generating distinct valid data source codes.
pub fn distinct_codes_strategy(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(data_source_code_strategy(), 1..=max)
        .prop_map(|codes| codes.into_iter().collect())
}

/// Strategy for generating codes the engine must reject.
pub fn invalid_code_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("   ".to_string()),
        prop::string::string_regex(&format!("[A-Z]{{{},40}}", MAX_CODE_LEN + 1))
            .expect("Invalid regex"),
        prop::string::string_regex("[A-Z]{1,5}[. /#][A-Z]{1,5}").expect("Invalid regex"),
    ]
}

/// Builds an `AddDataSource` request.
pub fn data_source_request(code: &str) -> String {
    serde_json::json!({ "DSRC_CODE": code }).to_string()
}

/// Strategy for generating out-of-range identifiers (zero or negative).
pub fn non_positive_id_strategy() -> impl Strategy<Value = i64> {
    i64::MIN..=0i64
}

/// Strategy for a sequence of config operations.
pub fn config_ops_strategy(max_ops: usize) -> impl Strategy<Value = Vec<ConfigOp>> {
    prop::collection::vec(
        prop_oneof![
            data_source_code_strategy().prop_map(ConfigOp::Add),
            data_source_code_strategy().prop_map(ConfigOp::Delete),
        ],
        0..max_ops,
    )
}

/// A data source mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOp {
    /// Add a code.
    Add(String),
    /// Delete a code.
    Delete(String),
}
