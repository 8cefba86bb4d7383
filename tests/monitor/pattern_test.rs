//! Pattern matching and action-chain dispatch.

use std::time::Duration;

use recwatch::action::{Action, ActionContext, DownloadAction, PublishAction};
use recwatch::pattern::Pattern;
use recwatch::store::StoreEndpoint;

use crate::mock::{MockBroker, MockRemote};

fn publish(topic: &str) -> Action {
    Action::Publish(PublishAction {
        topic: topic.to_owned(),
        payload: "{filename}".to_owned(),
    })
}

#[tokio::test]
async fn non_matching_file_runs_no_actions() {
    let broker = MockBroker::default();
    let mut publisher = broker.handle();
    let pattern = Pattern::new(None, r"Rec.*\.avi", vec![publish("events")]).expect("pattern");

    let mut ctx = ActionContext {
        device: "cam",
        store: None,
        publisher: &mut publisher,
    };
    assert!(!pattern.process(&mut ctx, "notes.txt").await);
    assert!(!pattern.process(&mut ctx, "xRecA.avi").await);

    assert!(broker.messages().is_empty());
    assert_eq!(broker.connects(), 0);
}

#[tokio::test]
async fn actions_run_in_declaration_order() {
    let broker = MockBroker::default();
    let mut publisher = broker.handle();
    let pattern = Pattern::new(
        Some("recordings".to_owned()),
        "Rec",
        vec![publish("first/{filename}"), publish("second/{filename}")],
    )
    .expect("pattern");

    let mut ctx = ActionContext {
        device: "cam",
        store: None,
        publisher: &mut publisher,
    };
    assert!(pattern.process(&mut ctx, "RecA.avi").await);

    assert_eq!(
        broker.messages(),
        vec![
            ("first/RecA.avi".to_owned(), "RecA.avi".to_owned()),
            ("second/RecA.avi".to_owned(), "RecA.avi".to_owned()),
        ]
    );
}

#[tokio::test]
async fn failing_action_does_not_stop_siblings() {
    let broker = MockBroker::default();
    let mut publisher = broker.handle();
    let download = Action::Download(DownloadAction {
        download_path: "/nonexistent/{filename}".to_owned(),
        download_filename: "{filename}".to_owned(),
    });
    let pattern = Pattern::new(
        None,
        "Rec",
        vec![download, publish("{bogus}"), Action::Wait(Duration::ZERO), publish("events")],
    )
    .expect("pattern");

    // No store: the download fails; the bad template fails; the rest still run.
    let mut ctx = ActionContext {
        device: "cam",
        store: None,
        publisher: &mut publisher,
    };
    assert!(pattern.process(&mut ctx, "RecA.avi").await);

    assert_eq!(
        broker.messages(),
        vec![("events".to_owned(), "RecA.avi".to_owned())]
    );
}

#[test]
fn name_falls_back_to_expression() {
    let unnamed = Pattern::new(None, "^Rec", Vec::new()).expect("pattern");
    assert_eq!(unnamed.name(), "^Rec");
    let named = Pattern::new(Some("clips".to_owned()), "^Rec", Vec::new()).expect("pattern");
    assert_eq!(named.name(), "clips");
    assert_eq!(named.file_pattern(), "^Rec");
}

#[tokio::test]
async fn failed_download_write_does_not_stop_later_publish() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"").expect("seed blocker");
    let remote = MockRemote::default();
    remote.put("RecA.avi", b"recording");
    let endpoint = StoreEndpoint {
        host: "cam.local".to_owned(),
        port: 21,
        user: "rec".to_owned(),
        password: String::new(),
        path: "/".to_owned(),
    };
    let mut store = remote.connector().connect(&endpoint).await.expect("mock connect");
    let broker = MockBroker::default();
    let mut publisher = broker.handle();

    let pattern = Pattern::new(
        None,
        "Rec",
        vec![
            Action::Download(DownloadAction {
                download_path: format!("{}/{{filename}}", blocker.display()),
                download_filename: "{filename}".to_owned(),
            }),
            publish("saved/{filename}"),
        ],
    )
    .expect("pattern");

    let mut ctx = ActionContext {
        device: "cam",
        store: Some(&mut store),
        publisher: &mut publisher,
    };
    assert!(pattern.process(&mut ctx, "RecA.avi").await);

    assert_eq!(remote.fetches(), vec!["RecA.avi".to_owned()]);
    assert_eq!(
        broker.messages(),
        vec![("saved/RecA.avi".to_owned(), "RecA.avi".to_owned())]
    );
}
