//! Integration tests for the handle lifecycle.
//!
//! These exercise the public API end to end: distinct identity across
//! creations, the open -> closed transition, allocation failure modes,
//! and concurrent creation.

use guestkit_core::{
    ApplianceConfig, CoreError, DriveSpec, HandleManager, HandleState, ManagerConfig,
};
use std::collections::HashSet;
use std::sync::Arc;

fn manager() -> HandleManager {
    HandleManager::new(ManagerConfig::default())
}

#[tokio::test]
async fn create_multiple_handles() {
    let manager = manager();

    let g1 = manager.create().await.expect("create g1");
    let g2 = manager.create().await.expect("create g2");
    let g3 = manager.create().await.expect("create g3");

    // All three are simultaneously valid
    assert!(manager.exists(g1).await);
    assert!(manager.exists(g2).await);
    assert!(manager.exists(g3).await);
    assert_eq!(manager.count().await, 3);

    // Pairwise distinct identities
    assert_ne!(g1, g2);
    assert_ne!(g2, g3);
    assert_ne!(g1, g3);
}

#[tokio::test]
async fn no_handles_is_a_valid_state() {
    let manager = manager();
    assert_eq!(manager.count().await, 0);
    assert!(manager.list().await.is_empty());
}

#[tokio::test]
async fn sequential_creations_all_distinct() {
    let manager = manager();
    let mut ids = HashSet::new();

    for _ in 0..32 {
        let id = manager.create().await.expect("create");
        assert!(ids.insert(id), "duplicate handle id: {}", id);
    }
    assert_eq!(manager.count().await, 32);
}

#[tokio::test]
async fn new_handle_is_open() {
    let manager = manager();
    let id = manager.create().await.unwrap();

    let state = manager.with_handle(id, |h| h.state()).await.unwrap();
    assert_eq!(state, HandleState::Open);
}

#[tokio::test]
async fn release_removes_the_handle() {
    let manager = manager();
    let id = manager.create().await.unwrap();

    manager.release(id).await.expect("release");
    assert!(!manager.exists(id).await);
    assert_eq!(manager.count().await, 0);
}

#[tokio::test]
async fn double_release_fails() {
    let manager = manager();
    let id = manager.create().await.unwrap();

    manager.release(id).await.expect("first release");
    let result = manager.release(id).await;
    assert!(matches!(result, Err(CoreError::InvalidHandle(_))));
}

#[tokio::test]
async fn operations_on_released_handle_fail() {
    let manager = manager();
    let id = manager.create().await.unwrap();
    manager.release(id).await.unwrap();

    assert!(matches!(
        manager.verbose(id).await,
        Err(CoreError::InvalidHandle(_))
    ));
    assert!(matches!(
        manager.set_verbose(id, true).await,
        Err(CoreError::InvalidHandle(_))
    ));
}

#[tokio::test]
async fn release_then_create_yields_distinct_handle() {
    let manager = manager();

    let first = manager.create().await.unwrap();
    manager.release(first).await.unwrap();

    let second = manager.create().await.unwrap();
    assert_ne!(first, second);
    assert!(manager.exists(second).await);
    assert!(!manager.exists(first).await);
}

#[tokio::test]
async fn releasing_one_handle_leaves_others_usable() {
    let manager = manager();
    let keep = manager.create().await.unwrap();
    let discard = manager.create().await.unwrap();

    manager.set_verbose(keep, true).await.unwrap();
    manager.release(discard).await.unwrap();

    // The surviving handle kept its state
    assert!(manager.verbose(keep).await.unwrap());
}

#[tokio::test]
async fn backend_capacity_exhaustion() {
    let manager = HandleManager::new(ManagerConfig::with_capacity(2));

    let a = manager.create().await.expect("first");
    let _b = manager.create().await.expect("second");

    let result = manager.create().await;
    assert!(matches!(result, Err(CoreError::Backend(_))));

    // Releasing makes room again
    manager.release(a).await.unwrap();
    manager.create().await.expect("after release");
}

#[tokio::test]
async fn max_handles_limit() {
    let config = ManagerConfig {
        max_handles: 1,
        ..ManagerConfig::default()
    };
    let manager = HandleManager::new(config);

    let _a = manager.create().await.expect("first");
    let result = manager.create().await;
    assert!(matches!(result, Err(CoreError::Allocation(_))));
}

#[tokio::test]
async fn concurrent_creations_get_distinct_ids() {
    let manager = Arc::new(HandleManager::new(ManagerConfig::with_capacity(128)));
    let mut tasks = Vec::new();

    for _ in 0..64 {
        let manager = Arc::clone(&manager);
        tasks.push(tokio::spawn(async move { manager.create().await.unwrap() }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        let id = task.await.unwrap();
        assert!(ids.insert(id), "duplicate handle id under concurrency");
    }
    assert_eq!(manager.count().await, 64);
}

#[tokio::test]
async fn release_all_drains_the_registry() {
    let manager = manager();
    for _ in 0..5 {
        manager.create().await.unwrap();
    }
    assert_eq!(manager.count().await, 5);

    manager.release_all().await.unwrap();
    assert_eq!(manager.count().await, 0);

    // The registry is usable again afterwards
    manager.create().await.expect("create after drain");
}

#[tokio::test]
async fn properties_round_trip_through_the_manager() {
    let manager = manager();
    let id = manager.create().await.unwrap();

    assert!(!manager.verbose(id).await.unwrap());
    manager.set_verbose(id, true).await.unwrap();
    assert!(manager.verbose(id).await.unwrap());

    assert!(!manager.trace(id).await.unwrap());
    manager.set_trace(id, true).await.unwrap();
    assert!(manager.trace(id).await.unwrap());
}

#[tokio::test]
async fn create_with_explicit_config() {
    let manager = manager();
    let config = ApplianceConfig::builder()
        .memory_mib(512)
        .smp(2)
        .identifier("integration")
        .build()
        .unwrap();

    let id = manager.create_with(config).await.unwrap();
    let memory = manager
        .with_handle(id, |h| h.config().memory_mib)
        .await
        .unwrap();
    assert_eq!(memory, 512);
}

#[tokio::test]
async fn invalid_config_is_rejected_at_creation() {
    let manager = manager();
    let mut config = ApplianceConfig::default();
    config.memory_mib = 1;

    let result = manager.create_with(config).await;
    assert!(matches!(result, Err(CoreError::Backend(_))));
    assert_eq!(manager.count().await, 0);
}

#[tokio::test]
async fn drive_registration() {
    let manager = manager();
    let id = manager.create().await.unwrap();

    manager
        .add_drive(id, DriveSpec::new("/var/lib/images/root.img").label("root"))
        .await
        .unwrap();
    manager
        .add_drive(id, DriveSpec::new("/var/lib/images/data.img").readonly(true))
        .await
        .unwrap();

    let drives = manager.drives(id).await.unwrap();
    assert_eq!(drives.len(), 2);
    assert_eq!(drives[0].label.as_deref(), Some("root"));
    assert!(drives[1].readonly);

    // Same label twice on one session is rejected
    let result = manager
        .add_drive(id, DriveSpec::new("/var/lib/images/other.img").label("root"))
        .await;
    assert!(matches!(result, Err(CoreError::Backend(_))));
}

#[tokio::test]
async fn handles_do_not_share_drive_state() {
    let manager = manager();
    let g1 = manager.create().await.unwrap();
    let g2 = manager.create().await.unwrap();

    manager
        .add_drive(g1, DriveSpec::new("/tmp/a.img").label("root"))
        .await
        .unwrap();

    // g2 never saw g1's drive, and may reuse the label
    assert!(manager.drives(g2).await.unwrap().is_empty());
    manager
        .add_drive(g2, DriveSpec::new("/tmp/b.img").label("root"))
        .await
        .unwrap();
}
