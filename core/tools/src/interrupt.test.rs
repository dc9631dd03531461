use std::sync::Arc;
use std::time::Duration;

use super::*;

#[tokio::test]
async fn trigger_requires_arming() {
    let manager = InterruptManager::new();
    assert!(!manager.trigger());
    assert!(!manager.check());

    manager.arm();
    assert!(manager.trigger());
    assert!(manager.check());
}

#[tokio::test]
async fn fires_once_per_arming() {
    let manager = InterruptManager::new();
    manager.arm();
    assert!(manager.trigger());
    assert!(!manager.trigger());
    // check() keeps reporting fired until clear().
    assert!(manager.check());
    manager.clear();
    assert!(!manager.check());
}

#[tokio::test]
async fn wait_observes_trigger() {
    let manager = Arc::new(InterruptManager::new());
    manager.arm();

    let waiter = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.wait(Some(Duration::from_secs(5))).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    manager.trigger();
    assert!(waiter.await.unwrap());
}

#[tokio::test]
async fn wait_times_out() {
    let manager = InterruptManager::new();
    manager.arm();
    assert!(!manager.wait(Some(Duration::from_millis(30))).await);
}

#[tokio::test]
async fn wait_returns_immediately_when_already_fired() {
    let manager = InterruptManager::new();
    manager.arm();
    manager.trigger();
    assert!(manager.wait(Some(Duration::from_millis(5))).await);
}
