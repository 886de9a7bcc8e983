//! End-to-end demo of the bulk orchestrator against the in-memory backend.
//!
//! Run with `cargo run -p rostra_bulk --example bulk_enroll`; set
//! `ROSTRA_LOG=debug` for the full trace.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::FutureExt;
use tracing::info;

use rostra_api::{
    CourseBackend, EnrollOptions, MockBackend, Notifier, OperationDescriptor, Severity, StaticGate,
};
use rostra_bulk::{BulkConfig, BulkController, ReconcilePolicy, RefreshFn};
use rostra_core::StudentRecord;

fn init_tracing() {
    let env = std::env::var("ROSTRA_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        println!("[{severity:?}] {message}");
    }
}

fn demo_roster() -> Vec<StudentRecord> {
    [
        ("s1", "Ada Lovelace"),
        ("s2", "Alan Turing"),
        ("s3", "Grace Hopper"),
        ("s4", "Edsger Dijkstra"),
    ]
    .into_iter()
    .map(|(id, name)| StudentRecord {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{id}@example.edu"),
    })
    .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let backend = Arc::new(
        MockBackend::with_students(demo_roster()).with_latency(Duration::from_millis(50)),
    );
    // One student already enrolled, to show partial success.
    backend.fail_with("s2", "already enrolled");

    let refresh_backend = Arc::clone(&backend);
    let refresh: RefreshFn = Arc::new(move || {
        let backend = Arc::clone(&refresh_backend);
        async move {
            let students = backend.list_students().await?;
            info!(count = students.len(), "demo: roster refreshed");
            Ok(())
        }
        .boxed()
    });

    let mut controller = BulkController::new(
        Arc::clone(&backend) as Arc<dyn CourseBackend>,
        Arc::new(StaticGate::confirming()),
        Arc::new(StdoutNotifier),
        refresh,
    )
    .with_config(BulkConfig { concurrency: 2 })
    .with_policy(ReconcilePolicy {
        delays: vec![Duration::from_millis(200), Duration::from_millis(600)],
    });
    controller.sync_roster(backend.list_students().await?);

    // Bulk enroll everyone into a course.
    controller.select_all(["s1", "s2", "s3", "s4"]);
    let result = controller
        .run(OperationDescriptor::enroll("course-42", EnrollOptions { progress: Some(0.0) }))
        .await?;
    info!(?result, "demo: enroll batch done");
    controller.finish_reconciliation().await;

    // Bulk delete two accounts; the gate auto-confirms in this demo.
    controller.sync_roster(backend.list_students().await?);
    controller.toggle("s3");
    controller.toggle("s4");
    let result = controller.run(OperationDescriptor::delete()).await?;
    info!(?result, "demo: delete batch done");
    controller.finish_reconciliation().await;

    let remaining = backend.list_students().await?;
    info!(count = remaining.len(), "demo: final roster size");
    Ok(())
}
