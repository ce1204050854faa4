//! `smehub request` -- run one report lifecycle from a JSON file.
//!
//! Prints the response JSON to stdout. Exit codes:
//! - 0: report generated (store write failures are only logged)
//! - 1: generation failed
//! - 2: unreadable file, malformed payload, or missing required fields

use std::path::Path;

use smehub_core::{LifecycleCoordinator, ReportRequest};
use tracing::error;

pub(crate) const EXIT_OK: i32 = 0;
pub(crate) const EXIT_GENERATION_FAILED: i32 = 1;
pub(crate) const EXIT_BAD_REQUEST: i32 = 2;

/// Load the request file, run it, and return the process exit code.
pub(crate) async fn run_request_file(path: &Path, coordinator: &LifecycleCoordinator) -> i32 {
    let request = match load_request(path) {
        Ok(r) => r,
        Err(message) => {
            error!("{}", message);
            print_error(&message);
            return EXIT_BAD_REQUEST;
        }
    };

    match coordinator.process_request(&request).await {
        Ok(response) => match serde_json::to_string_pretty(&response) {
            Ok(json) => {
                println!("{}", json);
                EXIT_OK
            }
            Err(e) => {
                error!(error = %e, "failed to serialize response");
                EXIT_GENERATION_FAILED
            }
        },
        Err(e) if e.is_client_error() => {
            print_error(&e.to_string());
            EXIT_BAD_REQUEST
        }
        Err(e) => {
            print_error(&format!("Internal server error: {}", e));
            EXIT_GENERATION_FAILED
        }
    }
}

fn load_request(path: &Path) -> Result<ReportRequest, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("invalid report request in {}: {}", path.display(), e))
}

fn print_error(message: &str) {
    println!("{}", serde_json::json!({ "error": message }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use smehub_core::{BusinessInfo, GenerationError, TemplateReportGenerator};

    fn write_request(dir: &tempfile::TempDir, body: serde_json::Value) -> std::path::PathBuf {
        let path = dir.path().join("request.json");
        std::fs::write(&path, body.to_string()).unwrap();
        path
    }

    fn valid(report_id: &str) -> serde_json::Value {
        serde_json::json!({
            "reportId": report_id,
            "userId": "u1",
            "businessInfo": {
                "businessName": "Acme",
                "postalCode": "90210",
                "country": "US",
                "industry": "Tech"
            },
            "finalPrompt": "analyze market"
        })
    }

    #[tokio::test]
    async fn valid_request_exits_0() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_request(&dir, valid("r1"));
        let coordinator =
            LifecycleCoordinator::new(None, Arc::new(TemplateReportGenerator::new()));
        assert_eq!(run_request_file(&path, &coordinator).await, EXIT_OK);
    }

    #[tokio::test]
    async fn empty_report_id_exits_2() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_request(&dir, valid(""));
        let coordinator =
            LifecycleCoordinator::new(None, Arc::new(TemplateReportGenerator::new()));
        assert_eq!(run_request_file(&path, &coordinator).await, EXIT_BAD_REQUEST);
    }

    #[tokio::test]
    async fn generator_error_exits_1() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_request(&dir, valid("r1"));
        let coordinator = LifecycleCoordinator::new(
            None,
            Arc::new(|_: &BusinessInfo, _: &str| -> Result<String, GenerationError> {
                Err("model timeout".into())
            }),
        );
        assert_eq!(
            run_request_file(&path, &coordinator).await,
            EXIT_GENERATION_FAILED
        );
    }

    #[tokio::test]
    async fn missing_file_exits_2() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator =
            LifecycleCoordinator::new(None, Arc::new(TemplateReportGenerator::new()));
        let code = run_request_file(&dir.path().join("absent.json"), &coordinator).await;
        assert_eq!(code, EXIT_BAD_REQUEST);
    }
}
