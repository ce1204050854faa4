//! Runs the conformance suite against a Firestore emulator.
//!
//! Skipped unless `FIRESTORE_EMULATOR_HOST` is set, e.g.
//! `gcloud emulators firestore start --host-port=localhost:8080`.

use std::sync::atomic::{AtomicUsize, Ordering};

use smehub_storage::conformance::run_conformance_suite;
use smehub_storage::{Credentials, FirestoreConfig, FirestoreStore};

/// The emulator treats this bearer token as an admin and skips rules.
const EMULATOR_ADMIN_TOKEN: &str = "owner";

static NEXT_COLLECTION: AtomicUsize = AtomicUsize::new(0);

/// Each factory call gets its own collection so seeded ids never leak
/// between conformance tests.
fn fresh_config(host: &str) -> FirestoreConfig {
    let n = NEXT_COLLECTION.fetch_add(1, Ordering::SeqCst);
    let mut config = FirestoreConfig::new("smehub-conformance")
        .with_emulator(host)
        .with_credentials(Credentials::Static(EMULATOR_ADMIN_TOKEN.to_string()));
    config.collection = format!("conformance-{}-{}", std::process::id(), n);
    config
}

fn seed_pending(host: &str, config: &FirestoreConfig, ids: &[String]) {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .into();
    for id in ids {
        let url = format!(
            "http://{}/v1/projects/{}/databases/{}/documents/{}?documentId={}",
            host, config.project_id, config.database, config.collection, id
        );
        let response = agent
            .post(&url)
            .header("Authorization", format!("Bearer {}", EMULATOR_ADMIN_TOKEN))
            .send_json(serde_json::json!({
                "fields": { "status": { "stringValue": "pending" } }
            }))
            .expect("emulator reachable");
        assert!(
            response.status().is_success(),
            "seeding {id} failed with {}",
            response.status()
        );
    }
}

#[tokio::test]
async fn firestore_emulator_passes_conformance() {
    let Ok(host) = std::env::var("FIRESTORE_EMULATOR_HOST") else {
        eprintln!("FIRESTORE_EMULATOR_HOST not set; skipping");
        return;
    };

    let report = run_conformance_suite(|ids| {
        let host = host.clone();
        async move {
            let config = fresh_config(&host);
            let seed_config = config.clone();
            tokio::task::spawn_blocking(move || seed_pending(&host, &seed_config, &ids))
                .await
                .expect("seeding task");
            FirestoreStore::new(config)
        }
    })
    .await;

    assert!(report.total >= 12, "suite shrank: {report}");
    assert_eq!(report.failed, 0, "{report}");
}
