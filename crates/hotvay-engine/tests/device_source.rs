use std::sync::Arc;

use hotvay_engine::{
    DeviceEvent, DeviceSource, EventStream, ReconnectPolicy,
    test_support::{MockDeviceApi, ReadStep, fast_device_cfg, key_report, next_within, recv_until},
};
use keycode::Transition;

fn source(api: &Arc<MockDeviceApi>, policy: ReconnectPolicy) -> DeviceSource {
    DeviceSource::new(api.clone(), fast_device_cfg(policy))
}

fn connected(serial: &str) -> DeviceEvent {
    DeviceEvent::Connected {
        serial: Some(serial.to_string()),
    }
}

fn disconnected(serial: &str) -> DeviceEvent {
    DeviceEvent::Disconnected {
        serial: Some(serial.to_string()),
    }
}

fn key(serial: &str, code: u8, transition: Transition) -> DeviceEvent {
    DeviceEvent::KeyTransition {
        serial: Some(serial.to_string()),
        code,
        transition,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn connects_then_reports_keys() {
    let api = Arc::new(MockDeviceApi::new().session(
        Some("S1"),
        vec![
            ReadStep::Report(key_report(3, true)),
            ReadStep::Idle,
            ReadStep::Report(key_report(3, false)),
        ],
    ));
    let mut events = source(&api, ReconnectPolicy::Resume).subscribe();
    let seen = recv_until(&mut events, 2000, |e| {
        *e == key("S1", 3, Transition::Released)
    })
    .await
    .expect("key release");
    assert_eq!(
        seen,
        vec![
            connected("S1"),
            key("S1", 3, Transition::Pressed),
            key("S1", 3, Transition::Released),
        ]
    );
    events.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn chatty_duplicates_are_coalesced() {
    let api = Arc::new(MockDeviceApi::new().session(
        Some("S1"),
        vec![
            ReadStep::Report(key_report(4, true)),
            ReadStep::Report(key_report(4, true)),
            ReadStep::Report(key_report(4, true)),
            ReadStep::Report(key_report(4, false)),
        ],
    ));
    let mut events = source(&api, ReconnectPolicy::Resume).subscribe();
    let seen = recv_until(&mut events, 2000, |e| {
        *e == key("S1", 4, Transition::Released)
    })
    .await
    .expect("key release");
    assert_eq!(seen.len(), 3, "got {:?}", seen);
    events.shutdown().await;
}

#[tokio::test]
async fn connected_twice_is_observed_once() {
    let (tx, stream) = EventStream::channel(4);
    let mut events = stream.dedup();
    assert!(tx.emit(connected("S1")).await);
    assert!(tx.emit(connected("S1")).await);
    assert!(tx.emit(disconnected("S1")).await);
    drop(tx);
    assert_eq!(next_within(&mut events, 1000).await, Some(connected("S1")));
    assert_eq!(next_within(&mut events, 1000).await, Some(disconnected("S1")));
    assert_eq!(next_within(&mut events, 1000).await, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_read_failure_is_retried() {
    let api = Arc::new(MockDeviceApi::new().session(
        Some("S1"),
        vec![ReadStep::Fail, ReadStep::Report(key_report(5, false))],
    ));
    let mut events = source(&api, ReconnectPolicy::Resume).subscribe();
    let seen = recv_until(&mut events, 2000, |e| matches!(e, DeviceEvent::KeyTransition { .. }))
        .await
        .expect("key after transient failure");
    assert_eq!(
        seen,
        vec![connected("S1"), key("S1", 5, Transition::Released)]
    );
    assert_eq!(api.opens(), 1);
    events.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn lost_device_resumes_when_reattached() {
    let api = Arc::new(
        MockDeviceApi::new()
            .session(Some("S1"), vec![ReadStep::Fail, ReadStep::Fail, ReadStep::Fail])
            .absent()
            .absent()
            .session(Some("S2"), vec![ReadStep::Report(key_report(1, false))]),
    );
    let mut events = source(&api, ReconnectPolicy::Resume).subscribe();
    let seen = recv_until(&mut events, 3000, |e| {
        *e == key("S2", 1, Transition::Released)
    })
    .await
    .expect("events from the second attachment");
    assert_eq!(
        seen,
        vec![
            connected("S1"),
            disconnected("S1"),
            connected("S2"),
            key("S2", 1, Transition::Released),
        ]
    );
    assert_eq!(api.opens(), 2);
    events.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_policy_ends_stream_after_disconnect() {
    let api = Arc::new(
        MockDeviceApi::new()
            .session(Some("S1"), vec![ReadStep::Fail, ReadStep::Fail, ReadStep::Fail])
            .session(Some("S2"), vec![]),
    );
    let mut events = source(&api, ReconnectPolicy::Stop).subscribe();
    assert_eq!(next_within(&mut events, 2000).await, Some(connected("S1")));
    assert_eq!(next_within(&mut events, 2000).await, Some(disconnected("S1")));
    assert_eq!(next_within(&mut events, 2000).await, None);
    assert_eq!(api.opens(), 1);
    assert_eq!(api.live_links(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_report_is_dropped() {
    let api = Arc::new(MockDeviceApi::new().session(
        Some("S1"),
        vec![
            ReadStep::Report(vec![1, 2]),
            ReadStep::Report(vec![0; 32]),
            ReadStep::Report(key_report(2, true)),
        ],
    ));
    let mut events = source(&api, ReconnectPolicy::Resume).subscribe();
    let seen = recv_until(&mut events, 2000, |e| matches!(e, DeviceEvent::KeyTransition { .. }))
        .await
        .expect("valid key report");
    assert_eq!(seen, vec![connected("S1"), key("S1", 2, Transition::Pressed)]);
    events.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn waits_for_absent_device() {
    let api = Arc::new(
        MockDeviceApi::new()
            .absent()
            .absent()
            .absent()
            .session(None, vec![]),
    );
    let mut events = source(&api, ReconnectPolicy::Resume).subscribe();
    assert_eq!(
        next_within(&mut events, 2000).await,
        Some(DeviceEvent::Connected { serial: None })
    );
    events.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_releases_the_device() {
    let api = Arc::new(MockDeviceApi::new().session(Some("S1"), vec![]));
    let mut events = source(&api, ReconnectPolicy::Resume).subscribe();
    assert_eq!(next_within(&mut events, 2000).await, Some(connected("S1")));
    assert_eq!(api.live_links(), 1);
    events.shutdown().await;
    assert_eq!(api.live_links(), 0);
}
