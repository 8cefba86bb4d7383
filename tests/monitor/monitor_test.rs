//! Poll cycles across several devices.

use std::sync::Arc;
use std::time::Duration;

use recwatch::action::{Action, PublishAction};
use recwatch::config::parse_config;
use recwatch::device::Device;
use recwatch::monitor::{CycleReport, Monitor};
use recwatch::pattern::Pattern;
use recwatch::store::StoreEndpoint;

use crate::mock::{MockBroker, MockRemote};

fn endpoint(host: &str) -> StoreEndpoint {
    StoreEndpoint {
        host: host.to_owned(),
        port: 21,
        user: "rec".to_owned(),
        password: String::new(),
        path: "/".to_owned(),
    }
}

fn publish(topic: &str) -> Action {
    Action::Publish(PublishAction {
        topic: topic.to_owned(),
        payload: "{filename}".to_owned(),
    })
}

#[tokio::test]
async fn from_config_builds_devices_and_drops_unknown_actions() {
    let config = parse_config(
        r#"
interval: 2
mqtt_host: broker.test
devices:
  - name: front
    patterns:
      - file_pattern: "Rec.*\\.avi$"
        actions:
          - action: frobnicate
          - action: mqtt
            topic: "cams/front/{filename}"
  - name: rear
    patterns:
      - name: everything
        file_pattern: ".*"
        actions:
          - action: wait
            duration: 0.5
"#,
    )
    .expect("config");
    let remote = MockRemote::with_files(&["old.avi"]);
    let broker = MockBroker::default();

    let monitor = Monitor::from_config(&config, remote.connector(), broker.connector())
        .expect("monitor");

    assert_eq!(monitor.interval(), Duration::from_secs(2));
    let names: Vec<&str> = monitor.devices().iter().map(Device::name).collect();
    assert_eq!(names, vec!["front", "rear"]);
    assert_eq!(monitor.devices()[0].patterns()[0].actions().len(), 1);
    assert_eq!(monitor.devices()[0].patterns()[0].actions()[0].kind(), "mqtt");
    assert_eq!(
        monitor.devices()[1].patterns()[0].actions(),
        &[Action::Wait(Duration::from_millis(500))]
    );
    assert!(!monitor.publisher().is_connected());
}

#[tokio::test]
async fn cycle_routes_new_files_through_every_matching_pattern() {
    let remote = MockRemote::with_files(&["old.avi"]);
    let broker = MockBroker::default();
    let patterns = vec![
        Pattern::new(None, "Rec", vec![publish("clips/{filename}")]).expect("pattern"),
        Pattern::new(None, r".*\.avi", vec![publish("all/{filename}")]).expect("pattern"),
    ];
    let device = Device::new("cam", endpoint("cam"), remote.connector(), patterns);
    let mut monitor = Monitor::new(vec![device], broker.handle(), Duration::from_secs(10));

    assert_eq!(monitor.connect_all().await, 1);
    remote.set_files(&["old.avi", "RecA.avi", "note.txt"]);
    let report = monitor.run_cycle().await;

    assert_eq!(
        report,
        CycleReport {
            devices: 1,
            new_files: 2
        }
    );
    assert_eq!(
        broker.messages(),
        vec![
            ("clips/RecA.avi".to_owned(), "RecA.avi".to_owned()),
            ("all/RecA.avi".to_owned(), "RecA.avi".to_owned()),
        ]
    );

    let report = monitor.run_cycle().await;
    assert_eq!(report.new_files, 0);
    assert_eq!(broker.messages().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn devices_are_processed_sequentially_in_declaration_order() {
    let first = MockRemote::with_files(&[]);
    let second = MockRemote::with_files(&[]);
    let broker = MockBroker::default();

    let slow = Pattern::new(
        None,
        "Rec",
        vec![Action::Wait(Duration::from_secs(5)), publish("first/{filename}")],
    )
    .expect("pattern");
    let fast = Pattern::new(None, "Rec", vec![publish("second/{filename}")]).expect("pattern");
    let devices = vec![
        Device::new("first", endpoint("first"), first.connector(), vec![slow]),
        Device::new("second", endpoint("second"), second.connector(), vec![fast]),
    ];
    let mut monitor = Monitor::new(devices, broker.handle(), Duration::from_secs(10));
    monitor.connect_all().await;

    first.set_files(&["RecA.avi"]);
    second.set_files(&["RecB.avi"]);
    let start = tokio::time::Instant::now();
    monitor.run_cycle().await;

    assert!(start.elapsed() >= Duration::from_secs(5));
    assert_eq!(
        broker.messages(),
        vec![
            ("first/RecA.avi".to_owned(), "RecA.avi".to_owned()),
            ("second/RecB.avi".to_owned(), "RecB.avi".to_owned()),
        ]
    );
}

#[tokio::test]
async fn failing_device_does_not_block_the_others() {
    let broken = MockRemote::with_files(&[]);
    broken.fail_next_connects(1000);
    let healthy = MockRemote::with_files(&[]);
    let broker = MockBroker::default();

    let devices = vec![
        Device::new(
            "broken",
            endpoint("broken"),
            broken.connector(),
            vec![Pattern::new(None, "Rec", vec![publish("broken")]).expect("pattern")],
        ),
        Device::new(
            "healthy",
            endpoint("healthy"),
            healthy.connector(),
            vec![Pattern::new(None, "Rec", vec![publish("healthy")]).expect("pattern")],
        ),
    ];
    let mut monitor = Monitor::new(devices, broker.handle(), Duration::from_secs(10));
    assert_eq!(monitor.connect_all().await, 1);

    healthy.set_files(&["RecA.avi"]);
    let report = monitor.run_cycle().await;

    assert_eq!(report.devices, 2);
    assert_eq!(report.new_files, 1);
    assert_eq!(
        broker.messages(),
        vec![("healthy".to_owned(), "RecA.avi".to_owned())]
    );
}

#[tokio::test]
async fn download_runs_end_to_end_through_the_device_connection() {
    let dir = tempfile::tempdir().expect("tempdir");
    let remote = MockRemote::with_files(&[]);
    let broker = MockBroker::default();
    let config = parse_config(&format!(
        r#"
devices:
  - name: cam
    patterns:
      - file_pattern: "Rec"
        actions:
          - action: download
            download_path: "{dir}/{{filename}}"
            download_filename: "copy-{{filename}}"
          - action: mqtt
            topic: "done"
            payload: "saved {{filename}}"
"#,
        dir = dir.path().display()
    ))
    .expect("config");
    let mut monitor = Monitor::from_config(&config, remote.connector(), broker.connector())
        .expect("monitor");
    monitor.connect_all().await;

    remote.put("RecA.avi", b"\x00\x01recording\xff");
    monitor.run_cycle().await;

    let target = dir.path().join("RecA.avi").join("copy-RecA.avi");
    assert_eq!(std::fs::read(target).expect("read"), b"\x00\x01recording\xff");
    assert_eq!(
        broker.messages(),
        vec![("done".to_owned(), "saved RecA.avi".to_owned())]
    );
}

#[tokio::test]
async fn publisher_connect_failure_only_skips_publish_actions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let remote = MockRemote::with_files(&[]);
    let broker = MockBroker::failing_connect();
    let config = parse_config(&format!(
        r#"
devices:
  - name: cam
    patterns:
      - file_pattern: "Rec"
        actions:
          - action: mqtt
            topic: "events"
          - action: download
            download_path: "{dir}"
"#,
        dir = dir.path().display()
    ))
    .expect("config");
    let mut monitor = Monitor::from_config(&config, remote.connector(), broker.connector())
        .expect("monitor");
    monitor.connect_all().await;

    remote.put("RecA.avi", b"one");
    monitor.run_cycle().await;
    remote.put("RecB.avi", b"two");
    monitor.run_cycle().await;

    assert!(monitor.publisher().is_failed());
    assert_eq!(broker.connects(), 1);
    assert_eq!(std::fs::read(dir.path().join("RecA.avi")).expect("a"), b"one");
    assert_eq!(std::fs::read(dir.path().join("RecB.avi")).expect("b"), b"two");
}

#[test]
fn monitor_shares_one_store_connector() {
    let remote = MockRemote::default();
    let connector = remote.connector();
    let config = parse_config("devices: [{name: a}, {name: b}]").expect("config");
    let monitor = Monitor::from_config(&config, Arc::clone(&connector), MockBroker::default().connector())
        .expect("monitor");
    assert_eq!(monitor.devices().len(), 2);
    assert_eq!(Arc::strong_count(&connector), 3);
}
