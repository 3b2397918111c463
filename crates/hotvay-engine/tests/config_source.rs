use std::{fs, path::Path, time::Duration};

use hotvay_engine::{
    ConfigSource, Error, EventStream,
    test_support::next_within,
};
use keycode::KeyIdentity;

fn write_keys(path: &Path, keys: &[u8]) {
    let entries: Vec<String> = keys
        .iter()
        .map(|k| {
            format!(
                r#"{{ "type": "app", "key": {}, "description": "key {}", "appBundleId": "a.b" }}"#,
                k, k
            )
        })
        .collect();
    fs::write(
        path,
        format!(r#"{{ "registrations": [{}] }}"#, entries.join(",")),
    )
    .unwrap();
}

fn keys_of(cfg: &config::Config) -> Vec<KeyIdentity> {
    cfg.entries.iter().map(|e| e.key).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn emits_current_content_on_subscribe() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".hotvay");
    write_keys(&path, &[1, 2]);

    let (_ticks_tx, ticks) = EventStream::channel(4);
    let mut configs = ConfigSource::new(&path).subscribe(ticks).unwrap();
    let cfg = next_within(&mut configs, 2000).await.expect("initial config");
    assert_eq!(
        keys_of(&cfg),
        vec![KeyIdentity::released(1), KeyIdentity::released(2)]
    );
    configs.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn identical_content_is_not_reemitted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".hotvay");
    write_keys(&path, &[1]);

    let (ticks_tx, ticks) = EventStream::channel(4);
    let mut configs = ConfigSource::new(&path).subscribe(ticks).unwrap();
    assert!(next_within(&mut configs, 2000).await.is_some());

    write_keys(&path, &[1]);
    assert!(ticks_tx.emit(()).await);
    assert!(ticks_tx.emit(()).await);
    assert!(next_within(&mut configs, 200).await.is_none());

    write_keys(&path, &[7]);
    assert!(ticks_tx.emit(()).await);
    let cfg = next_within(&mut configs, 2000).await.expect("changed config");
    assert_eq!(keys_of(&cfg), vec![KeyIdentity::released(7)]);
    configs.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn parse_failure_emits_nothing_and_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".hotvay");
    write_keys(&path, &[1]);

    let (ticks_tx, ticks) = EventStream::channel(4);
    let mut configs = ConfigSource::new(&path).subscribe(ticks).unwrap();
    assert!(next_within(&mut configs, 2000).await.is_some());

    fs::write(&path, "{ \"registrations\": [ oops ] }").unwrap();
    assert!(ticks_tx.emit(()).await);
    assert!(next_within(&mut configs, 200).await.is_none());

    write_keys(&path, &[2]);
    assert!(ticks_tx.emit(()).await);
    let cfg = next_within(&mut configs, 2000).await.expect("fixed config");
    assert_eq!(keys_of(&cfg), vec![KeyIdentity::released(2)]);
    configs.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_initial_content_waits_for_a_fix() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".hotvay");
    fs::write(&path, "not json").unwrap();

    let (ticks_tx, ticks) = EventStream::channel(4);
    let mut configs = ConfigSource::new(&path).subscribe(ticks).unwrap();
    assert!(next_within(&mut configs, 200).await.is_none());

    write_keys(&path, &[3]);
    assert!(ticks_tx.emit(()).await);
    assert!(next_within(&mut configs, 2000).await.is_some());
    configs.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn deleted_file_keeps_stream_alive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".hotvay");
    write_keys(&path, &[1]);

    let (ticks_tx, ticks) = EventStream::channel(4);
    let mut configs = ConfigSource::new(&path).subscribe(ticks).unwrap();
    assert!(next_within(&mut configs, 2000).await.is_some());

    fs::remove_file(&path).unwrap();
    assert!(ticks_tx.emit(()).await);
    assert!(next_within(&mut configs, 200).await.is_none());

    write_keys(&path, &[4]);
    assert!(ticks_tx.emit(()).await);
    let cfg = next_within(&mut configs, 2000).await.expect("recreated config");
    assert_eq!(keys_of(&cfg), vec![KeyIdentity::released(4)]);
    configs.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (_ticks_tx, ticks) = EventStream::channel(1);
    match ConfigSource::new(dir.path().join(".hotvay")).subscribe(ticks) {
        Err(Error::Config(e)) => assert!(e.is_missing()),
        other => panic!("expected missing config, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn filesystem_changes_trigger_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".hotvay");
    write_keys(&path, &[1]);

    let mut configs = ConfigSource::new(&path).watch().unwrap();
    assert!(next_within(&mut configs, 2000).await.is_some());

    // Give the watcher a moment to settle before editing.
    tokio::time::sleep(Duration::from_millis(50)).await;
    write_keys(&path, &[9]);
    let cfg = next_within(&mut configs, 5000).await.expect("reloaded config");
    assert_eq!(keys_of(&cfg), vec![KeyIdentity::released(9)]);
    configs.shutdown().await;
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn edits_through_symlink_target_trigger_reload() {
    let dir = tempfile::tempdir().unwrap();
    let dotfiles = dir.path().join("dotfiles");
    fs::create_dir(&dotfiles).unwrap();
    let target = dotfiles.join("hotvay.json");
    write_keys(&target, &[1]);
    let link = dir.path().join(".hotvay");
    std::os::unix::fs::symlink(&target, &link).unwrap();

    let mut configs = ConfigSource::new(&link).watch().unwrap();
    let cfg = next_within(&mut configs, 2000).await.expect("initial config");
    assert_eq!(keys_of(&cfg), vec![KeyIdentity::released(1)]);

    tokio::time::sleep(Duration::from_millis(50)).await;
    write_keys(&target, &[7]);
    let cfg = next_within(&mut configs, 5000).await.expect("reloaded config");
    assert_eq!(keys_of(&cfg), vec![KeyIdentity::released(7)]);
    configs.shutdown().await;
}
