mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use pgvault_server::scheduler::{BackupScheduler, SweepSummary};

use common::{FakeDumper, HarnessBuilder, harness};

#[tokio::test]
async fn sweep_backs_up_every_tenant_and_counts_failures() {
    // `beta` has no backup folder in the store, so its backup fails.
    let h = harness();
    let scheduler = BackupScheduler::new(
        Arc::clone(&h.state.registry),
        Arc::clone(&h.state.backups),
        Duration::from_secs(60),
    );

    let summary = scheduler.run_once().await;

    assert_eq!(
        summary,
        SweepSummary {
            uploaded: 1,
            skipped: 0,
            failed: 1,
        }
    );
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn sweep_continues_after_dump_failures() {
    let h = HarnessBuilder::default()
        .dumper(FakeDumper::failing())
        .build();
    h.store.create_folder("beta-backups");
    let scheduler = BackupScheduler::new(
        Arc::clone(&h.state.registry),
        Arc::clone(&h.state.backups),
        Duration::from_secs(60),
    );

    let summary = scheduler.run_once().await;

    assert_eq!(summary.failed, 2);
    assert_eq!(h.dumper.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn runs_on_interval_until_cancelled() {
    let h = harness();
    let scheduler = BackupScheduler::new(
        Arc::clone(&h.state.registry),
        Arc::clone(&h.state.backups),
        Duration::from_secs(600),
    );
    let shutdown = CancellationToken::new();
    let handle = scheduler.spawn(shutdown.clone());

    // Nothing runs before the first interval has elapsed.
    tokio::time::sleep(Duration::from_secs(599)).await;
    assert_eq!(h.dumper.calls(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.dumper.calls(), 1);

    shutdown.cancel();
    handle.await.unwrap();
    assert_eq!(h.dumper.calls(), 1);
}
