//! Conformance test suite for `ReportStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `ReportStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Update**: partial merge, server timestamps, status transitions
//! - **Field deletion**: a transition removes fields its status must not carry
//! - **Error handling**: correct error variants for missing documents
//! - **Concurrency**: parallel writes to different documents all land
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory that creates a
//! fresh store holding a `pending` record for each id it is given:
//!
//! ```ignore
//! use smehub_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn firestore_emulator_conformance() {
//!     let report = run_conformance_suite(|ids| async move {
//!         seed_emulator_collection(&ids).await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod error;
mod update;

use std::fmt;
use std::future::Future;

use crate::ReportStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "update", "error").
    pub category: String,
    /// Test name (e.g. "completed_sets_report_and_timestamps").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` is called once per test with the report ids that test needs
/// seeded as `pending`; it must return a store containing exactly those.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: ReportStore,
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(update::run_update_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
