//! Assertions shared by pipeline tests

use crate::extract::Credential;
use crate::orchestrator::{RequestReport, RequestState};
use std::collections::HashSet;
use std::fmt::Debug;
use std::path::Path;

/// Assert that a Result is Ok and return the value
pub fn assert_ok<T, E: Debug>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("Expected Ok, got Err: {:?}", e),
    }
}

/// Assert that a Result is Err and return the error
pub fn assert_err<T: Debug, E>(result: Result<T, E>) -> E {
    match result {
        Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
        Err(e) => e,
    }
}

/// Assert that no credential appears twice
pub fn assert_unique(credentials: &[Credential]) {
    let mut seen = HashSet::new();
    for c in credentials {
        assert!(seen.insert(c), "Duplicate credential in result: {}", c);
    }
}

/// Assert the request ended in `expected`, showing the error otherwise
pub fn assert_state(report: &RequestReport, expected: RequestState) {
    assert_eq!(
        report.state, expected,
        "Unexpected final state (error: {:?})",
        report.error
    );
}

/// Assert that no `*_combos.txt` artifact is left in `dir`
pub fn assert_no_artifacts(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let leftovers: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with("_combos.txt"))
        .collect();
    assert!(leftovers.is_empty(), "Artifacts left behind: {:?}", leftovers);
}
