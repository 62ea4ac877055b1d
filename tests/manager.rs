mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use netmux::config::SessionConfig;
use netmux::device::Brand;
use netmux::error::SessionError;
use netmux::session::{ConnectFuture, Connector, Identity, Session, SessionManager};
use tokio::time::{Instant, sleep};

use common::{Received, count, fake_device, init_logger, test_config, vrp};

/// Connector backed by fake Huawei switches. Records every device it creates.
fn fake_connector(devices: Arc<Mutex<Vec<Received>>>) -> Connector {
    Arc::new(move |identity: Identity, config: SessionConfig| -> ConnectFuture {
        let devices = devices.clone();
        Box::pin(async move {
            let (stream, received) = fake_device(vrp);
            devices.lock().unwrap().push(received);
            Ok(Session::start(identity.label(), stream, config).await)
        })
    })
}

fn fake_manager() -> (SessionManager, Arc<Mutex<Vec<Received>>>) {
    let devices = Arc::new(Mutex::new(Vec::new()));
    let manager =
        SessionManager::with_connector(fake_connector(devices.clone())).session_config(test_config());
    (manager, devices)
}

fn admin(address: &str) -> Identity {
    Identity::new("admin", "Admin@123", address)
}

#[tokio::test(start_paused = true)]
async fn run_commands_returns_filtered_output() {
    init_logger();
    let (manager, _devices) = fake_manager();

    let output = manager
        .run_commands(&admin("10.0.0.1:22"), &["display version"])
        .await
        .expect("run commands");

    assert!(output.starts_with("display version"));
    assert!(output.contains("Huawei Versatile Routing Platform Software"));
    assert!(output.ends_with("<sw1>\n"));
    assert!(!output.contains("VTY users"));
}

#[tokio::test(start_paused = true)]
async fn sessions_are_reused_per_identity() {
    let (manager, devices) = fake_manager();
    let identity = admin("10.0.0.1:22");

    manager
        .run_commands(&identity, &["display version"])
        .await
        .expect("first run");
    let output = manager
        .run_commands(&identity, &["display clock"])
        .await
        .expect("second run");

    assert!(output.starts_with("display clock"));
    assert_eq!(devices.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_command_list_is_rejected() {
    let (manager, devices) = fake_manager();

    let err = manager
        .run_commands(&admin("10.0.0.1:22"), &[])
        .await
        .expect_err("no commands");

    assert!(matches!(err, SessionError::NoCommands));
    assert!(devices.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn brand_is_detected_through_pool() {
    let (manager, devices) = fake_manager();
    let identity = admin("10.0.0.1:22");

    assert_eq!(manager.brand(&identity).await.expect("brand"), Some(Brand::Huawei));
    assert_eq!(manager.brand(&identity).await.expect("brand"), Some(Brand::Huawei));

    let devices = devices.lock().unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(count(&devices[0], "dis version"), 1);
}

#[tokio::test(start_paused = true)]
async fn brand_hint_prevents_probe() {
    let (manager, devices) = fake_manager();
    let identity = admin("10.0.0.2:22");

    manager
        .run_commands_with_brand(&identity, Some(Brand::H3c), &["display clock"])
        .await
        .expect("run commands");

    assert_eq!(manager.brand(&identity).await.expect("brand"), Some(Brand::H3c));
    assert_eq!(count(&devices.lock().unwrap()[0], "dis version"), 0);
}

#[tokio::test(start_paused = true)]
async fn closed_session_is_replaced() {
    let (manager, devices) = fake_manager();
    let identity = admin("10.0.0.1:22");

    {
        let mut lease = manager.session(&identity, None).await.expect("session");
        lease.close().await;
    }

    manager
        .run_commands(&identity, &["display clock"])
        .await
        .expect("run after close");
    assert_eq!(devices.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn removed_identity_reconnects() {
    let (manager, devices) = fake_manager();
    let identity = admin("10.0.0.1:22");

    manager
        .run_commands(&identity, &["display clock"])
        .await
        .expect("first run");
    manager.remove(&identity).await;
    manager
        .run_commands(&identity, &["display clock"])
        .await
        .expect("second run");

    assert_eq!(devices.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn same_identity_is_serialized() {
    let (manager, devices) = fake_manager();
    let identity = admin("10.0.0.1:22");
    let in_use = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));

    let started = Instant::now();
    let tasks: Vec<_> = (0..3)
        .map(|_| {
            let manager = manager.clone();
            let identity = identity.clone();
            let in_use = in_use.clone();
            let overlaps = overlaps.clone();
            tokio::spawn(async move {
                let _lease = manager.session(&identity, None).await.expect("session");
                if in_use.swap(true, Ordering::SeqCst) {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                sleep(Duration::from_secs(1)).await;
                in_use.store(false, Ordering::SeqCst);
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("task");
    }

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(devices.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn distinct_identities_run_in_parallel() {
    let (manager, devices) = fake_manager();

    let started = Instant::now();
    let tasks: Vec<_> = ["10.0.0.1:22", "10.0.0.2:22"]
        .into_iter()
        .map(|address| {
            let manager = manager.clone();
            let identity = admin(address);
            tokio::spawn(async move {
                let _lease = manager.session(&identity, None).await.expect("session");
                sleep(Duration::from_secs(1)).await;
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("task");
    }

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(devices.lock().unwrap().len(), 2);
}

#[test]
fn identity_key_hides_password() {
    let identity = admin("10.0.0.1:22");
    let other = Identity::new("admin", "other", "10.0.0.1:22");

    assert!(!identity.cache_key().contains("Admin@123"));
    assert!(!format!("{identity:?}").contains("Admin@123"));
    assert_ne!(identity.cache_key(), other.cache_key());
    assert_eq!(identity.label(), "admin@10.0.0.1:22");
}
