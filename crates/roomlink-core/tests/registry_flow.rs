//! End-to-end reconciliation tests driving a mock engine through the
//! registry and observing the outbound event stream.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::mpsc;

use roomlink_core::SessionRegistry;
use roomlink_core::engine::{
    ConnectOptions, EngineEvent, EngineEvents, EngineSession, MediaEngine, RemoteSeed,
};
use roomlink_core::errors::RoomlinkError;
use roomlink_core::events::{RoomEvent, RoomEventListener};
use roomlink_core::participants::ParticipantInfo;
use roomlink_core::sinks::VideoSink;
use roomlink_core::stats::{RemoteAudioTrackStats, StatsReport};
use roomlink_core::track::{TrackInfo, TrackKind};

#[derive(Default)]
struct EngineCalls {
    closes: usize,
    playback: Vec<(String, bool)>,
    published: Vec<String>,
}

struct MockEngineSession {
    calls: Arc<StdMutex<EngineCalls>>,
}

impl EngineSession for MockEngineSession {
    fn close(&self) {
        self.calls.lock().unwrap().closes += 1;
    }

    fn publish_track(&self, track: &TrackInfo) {
        self.calls.lock().unwrap().published.push(track.sid.clone());
    }

    fn unpublish_track(&self, _track_sid: &str) {}

    fn set_playback_enabled(&self, track_sid: &str, enabled: bool) {
        self.calls
            .lock()
            .unwrap()
            .playback
            .push((track_sid.to_string(), enabled));
    }

    fn request_stats(&self) {}

    fn switch_camera(&self) -> bool {
        true
    }

    fn send_data_message(&self, _message: &str) {}
}

#[derive(Default)]
struct MockEngine {
    calls: Arc<StdMutex<EngineCalls>>,
    tx: StdMutex<Option<mpsc::UnboundedSender<EngineEvent>>>,
}

impl MockEngine {
    fn new() -> Self {
        Self::default()
    }

    fn send(&self, event: EngineEvent) {
        self.tx
            .lock()
            .unwrap()
            .as_ref()
            .expect("engine not opened")
            .send(event)
            .expect("session event loop gone");
    }

    fn closes(&self) -> usize {
        self.calls.lock().unwrap().closes
    }
}

impl MediaEngine for MockEngine {
    fn open(&self, _options: &ConnectOptions) -> (Arc<dyn EngineSession>, EngineEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.tx.lock().unwrap() = Some(tx);
        (
            Arc::new(MockEngineSession {
                calls: self.calls.clone(),
            }),
            rx,
        )
    }
}

#[derive(Default)]
struct Capture {
    events: StdMutex<Vec<RoomEvent>>,
}

impl RoomEventListener for Capture {
    fn on_event(&self, event: RoomEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Capture {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    fn names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    fn payloads(&self) -> Vec<serde_json::Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.to_json())
            .collect()
    }

    async fn wait_for(&self, count: usize) {
        for _ in 0..400 {
            if self.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "timed out waiting for {count} events, got {:?}",
            self.names()
        );
    }
}

fn participant(identity: &str) -> ParticipantInfo {
    ParticipantInfo {
        identity: identity.to_string(),
        sid: format!("PA-{identity}"),
    }
}

fn track(sid: &str, kind: TrackKind) -> TrackInfo {
    TrackInfo {
        sid: sid.to_string(),
        name: format!("name-{sid}"),
        kind,
        enabled: true,
    }
}

fn connect_succeeded(remotes: Vec<RemoteSeed>) -> EngineEvent {
    EngineEvent::ConnectSucceeded {
        room_sid: "RM01".to_string(),
        local_participant: participant("me"),
        remote_participants: remotes,
    }
}

async fn open_room(
    registry: &SessionRegistry,
    engine: &MockEngine,
    room: &str,
) -> Arc<roomlink_core::session::Session> {
    registry
        .open(engine, ConnectOptions::new(room, "token"))
        .await
        .expect("open failed")
}

#[tokio::test]
async fn connected_lists_seeded_participants_without_duplicates() {
    let registry = SessionRegistry::new();
    let capture = Capture::new();
    registry.add_listener(capture.clone());
    let engine = MockEngine::new();

    open_room(&registry, &engine, "roomA").await;
    engine.send(connect_succeeded(vec![
        RemoteSeed {
            participant: participant("alice"),
            tracks: vec![track("MT-a", TrackKind::Audio)],
        },
        RemoteSeed {
            participant: participant("bob"),
            tracks: Vec::new(),
        },
    ]));

    capture.wait_for(1).await;
    let payloads = capture.payloads();
    assert_eq!(payloads[0]["type"], "connected");
    assert_eq!(payloads[0]["roomName"], "roomA");
    assert_eq!(payloads[0]["roomSid"], "RM01");
    let participants = payloads[0]["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 3);
    assert_eq!(participants[2]["identity"], "me");

    // A genuinely new participant still produces an event; the seeded
    // ones never get a duplicate participantConnected.
    engine.send(EngineEvent::ParticipantConnected(participant("carol")));
    capture.wait_for(2).await;
    assert_eq!(
        capture.names(),
        vec!["connected", "participantConnected"]
    );
    assert_eq!(capture.payloads()[1]["participant"]["identity"], "carol");
}

#[tokio::test]
async fn duplicate_participant_add_is_deduplicated() {
    let registry = SessionRegistry::new();
    let capture = Capture::new();
    registry.add_listener(capture.clone());
    let engine = MockEngine::new();

    let session = open_room(&registry, &engine, "roomA").await;
    engine.send(connect_succeeded(Vec::new()));
    engine.send(EngineEvent::ParticipantConnected(participant("alice")));
    engine.send(EngineEvent::ParticipantConnected(participant("alice")));
    // A later distinct participant proves both adds were processed.
    engine.send(EngineEvent::ParticipantConnected(participant("bob")));

    capture.wait_for(3).await;
    assert_eq!(
        capture.names(),
        vec!["connected", "participantConnected", "participantConnected"]
    );
    assert_eq!(session.participants().await.len(), 2);
}

#[tokio::test]
async fn track_removals_precede_participant_removal() {
    let registry = SessionRegistry::new();
    let capture = Capture::new();
    registry.add_listener(capture.clone());
    let engine = MockEngine::new();

    open_room(&registry, &engine, "roomA").await;
    engine.send(connect_succeeded(Vec::new()));
    engine.send(EngineEvent::ParticipantConnected(participant("alice")));
    engine.send(EngineEvent::TrackSubscribed {
        participant: "alice".to_string(),
        track: track("MT-a", TrackKind::Audio),
    });
    engine.send(EngineEvent::TrackSubscribed {
        participant: "alice".to_string(),
        track: track("MT-v", TrackKind::Video),
    });
    engine.send(EngineEvent::ParticipantDisconnected(participant("alice")));

    capture.wait_for(7).await;
    let names = capture.names();
    assert_eq!(
        names,
        vec![
            "connected",
            "participantConnected",
            "participantAddedAudioTrack",
            "participantAddedVideoTrack",
            "participantRemovedAudioTrack",
            "participantRemovedVideoTrack",
            "participantDisconnected",
        ]
    );
}

#[tokio::test]
async fn randomized_departures_keep_track_before_participant_ordering() {
    use rand::seq::SliceRandom;

    let registry = SessionRegistry::new();
    let capture = Capture::new();
    registry.add_listener(capture.clone());
    let engine = MockEngine::new();

    open_room(&registry, &engine, "roomA").await;
    engine.send(connect_succeeded(Vec::new()));

    let identities: Vec<String> = (0..5).map(|i| format!("p{i}")).collect();
    let mut expected = 1; // connected
    for (i, id) in identities.iter().enumerate() {
        engine.send(EngineEvent::ParticipantConnected(participant(id)));
        expected += 1;
        for t in 0..=(i % 3) {
            let kind = if t % 2 == 0 {
                TrackKind::Audio
            } else {
                TrackKind::Video
            };
            engine.send(EngineEvent::TrackSubscribed {
                participant: id.clone(),
                track: track(&format!("MT-{id}-{t}"), kind),
            });
            expected += 2; // added now, removed on departure
        }
    }

    let mut departures = identities.clone();
    departures.shuffle(&mut rand::thread_rng());
    for id in &departures {
        engine.send(EngineEvent::ParticipantDisconnected(participant(id)));
        expected += 1;
    }

    capture.wait_for(expected).await;
    let payloads = capture.payloads();
    for id in &identities {
        let gone_at = payloads
            .iter()
            .position(|p| {
                p["type"] == "participantDisconnected" && p["participant"]["identity"] == id.as_str()
            })
            .expect("missing participantDisconnected");
        for (i, p) in payloads.iter().enumerate() {
            let ty = p["type"].as_str().unwrap();
            if ty.starts_with("participantRemoved")
                && p["participant"]["identity"] == id.as_str()
            {
                assert!(
                    i < gone_at,
                    "track removal after participant removal for {id}"
                );
            }
        }
    }
}

#[tokio::test]
async fn close_is_idempotent_and_disconnect_emitted_once() {
    let registry = SessionRegistry::new();
    let capture = Capture::new();
    registry.add_listener(capture.clone());
    let engine = MockEngine::new();

    open_room(&registry, &engine, "roomA").await;
    engine.send(connect_succeeded(Vec::new()));
    capture.wait_for(1).await;

    registry.close("roomA").await;
    registry.close("roomA").await;
    assert_eq!(engine.closes(), 1);

    // In-flight callbacks for the closed session are dropped silently.
    engine.send(EngineEvent::ParticipantConnected(participant("late")));
    engine.send(EngineEvent::Disconnected { error: None });
    capture.wait_for(2).await;
    assert_eq!(capture.names(), vec!["connected", "disconnected"]);
    let disconnect = &capture.payloads()[1];
    assert_eq!(disconnect["participant"], "me");
    assert!(disconnect.get("error").is_none());

    registry.close("roomA").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(capture.len(), 2);
}

#[tokio::test]
async fn close_of_never_opened_room_is_a_noop() {
    let registry = SessionRegistry::new();
    let capture = Capture::new();
    registry.add_listener(capture.clone());

    registry.close("ghost").await;
    assert_eq!(capture.len(), 0);
}

#[tokio::test]
async fn duplicate_open_is_rejected() {
    let registry = SessionRegistry::new();
    let engine = MockEngine::new();

    open_room(&registry, &engine, "roomA").await;
    let err = registry
        .open(&engine, ConnectOptions::new("roomA", "token"))
        .await
        .unwrap_err();
    assert!(matches!(err, RoomlinkError::DuplicateSession(room) if room == "roomA"));
}

#[tokio::test]
async fn connect_failure_surfaces_error_and_frees_room() {
    let registry = SessionRegistry::new();
    let capture = Capture::new();
    registry.add_listener(capture.clone());
    let engine = MockEngine::new();

    open_room(&registry, &engine, "roomA").await;
    engine.send(EngineEvent::ConnectFailed {
        error: "token expired".to_string(),
    });

    capture.wait_for(1).await;
    let payload = &capture.payloads()[0];
    assert_eq!(payload["type"], "connectFailure");
    assert_eq!(payload["error"], "token expired");

    // The failed session frees its slot; the room can be reopened.
    for _ in 0..400 {
        if registry.lookup("roomA").await.is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(registry.lookup("roomA").await.is_none());
    assert!(
        registry
            .open(&engine, ConnectOptions::new("roomA", "token2"))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn quality_ordinal_zero_is_suppressed_and_levels_shift() {
    let registry = SessionRegistry::new();
    let capture = Capture::new();
    registry.add_listener(capture.clone());
    let engine = MockEngine::new();

    open_room(&registry, &engine, "roomA").await;
    engine.send(connect_succeeded(Vec::new()));
    engine.send(EngineEvent::NetworkQualityChanged {
        participant: "me".to_string(),
        is_local: true,
        level: 0,
    });
    engine.send(EngineEvent::NetworkQualityChanged {
        participant: "me".to_string(),
        is_local: true,
        level: 3,
    });

    // Events are processed in order, so seeing the second quality
    // change proves the ordinal-0 one produced nothing.
    capture.wait_for(2).await;
    let names = capture.names();
    assert_eq!(names, vec!["connected", "networkQualityLevelsChanged"]);
    let payload = &capture.payloads()[1];
    assert_eq!(payload["quality"], 2);
    assert_eq!(payload["isLocalUser"], true);
}

#[tokio::test]
async fn stats_snapshot_is_keyed_by_connection_id() {
    let registry = SessionRegistry::new();
    let capture = Capture::new();
    registry.add_listener(capture.clone());
    let engine = MockEngine::new();

    open_room(&registry, &engine, "roomA").await;
    engine.send(connect_succeeded(Vec::new()));
    engine.send(EngineEvent::Stats(vec![StatsReport {
        peer_connection_id: "PC-1".to_string(),
        remote_audio_track_stats: vec![
            RemoteAudioTrackStats::default(),
            RemoteAudioTrackStats::default(),
        ],
        ..Default::default()
    }]));

    capture.wait_for(2).await;
    let payload = &capture.payloads()[1];
    assert_eq!(payload["type"], "statsReceived");
    let conn = &payload["PC-1"];
    assert_eq!(conn["remoteAudioTrackStats"].as_array().unwrap().len(), 2);
    assert_eq!(conn["remoteVideoTrackStats"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn data_messages_arrive_in_order_via_worker() {
    let registry = SessionRegistry::new();
    let capture = Capture::new();
    registry.add_listener(capture.clone());
    let engine = MockEngine::new();

    open_room(&registry, &engine, "roomA").await;
    engine.send(connect_succeeded(Vec::new()));
    for i in 0..3 {
        engine.send(EngineEvent::DataMessage {
            track_sid: "DT-1".to_string(),
            message: format!("msg-{i}"),
        });
    }

    capture.wait_for(4).await;
    let messages: Vec<String> = capture
        .payloads()
        .iter()
        .filter(|p| p["type"] == "dataTrackMessageReceived")
        .map(|p| p["message"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(messages, vec!["msg-0", "msg-1", "msg-2"]);
}

#[tokio::test]
async fn remote_audio_playback_follows_subscription() {
    let registry = SessionRegistry::new();
    let capture = Capture::new();
    registry.add_listener(capture.clone());
    let engine = MockEngine::new();

    let mut options = ConnectOptions::new("roomA", "token");
    options.enable_remote_audio = true;
    registry.open(&engine, options).await.expect("open failed");
    engine.send(connect_succeeded(Vec::new()));
    engine.send(EngineEvent::ParticipantConnected(participant("alice")));
    engine.send(EngineEvent::TrackSubscribed {
        participant: "alice".to_string(),
        track: track("MT-a", TrackKind::Audio),
    });

    capture.wait_for(3).await;
    let playback = engine.calls.lock().unwrap().playback.clone();
    assert_eq!(playback, vec![("MT-a".to_string(), true)]);
}

struct RecordingSink {
    journal: Arc<StdMutex<Vec<String>>>,
}

impl VideoSink for RecordingSink {
    fn on_bind(&self, track_sid: &str) {
        self.journal.lock().unwrap().push(format!("bind:{track_sid}"));
    }

    fn on_unbind(&self, track_sid: &str) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("unbind:{track_sid}"));
    }
}

#[tokio::test]
async fn ui_sink_bound_before_subscription_attaches_on_subscribe() {
    let registry = SessionRegistry::new();
    let capture = Capture::new();
    registry.add_listener(capture.clone());
    let engine = MockEngine::new();

    // UI attaches its view before the engine has subscribed the track.
    let journal = Arc::new(StdMutex::new(Vec::new()));
    registry.router().bind(
        "MT-v",
        Arc::new(RecordingSink {
            journal: journal.clone(),
        }),
    );
    assert!(journal.lock().unwrap().is_empty());

    open_room(&registry, &engine, "roomA").await;
    engine.send(connect_succeeded(Vec::new()));
    engine.send(EngineEvent::ParticipantConnected(participant("alice")));
    engine.send(EngineEvent::TrackSubscribed {
        participant: "alice".to_string(),
        track: track("MT-v", TrackKind::Video),
    });

    capture.wait_for(3).await;
    assert_eq!(*journal.lock().unwrap(), vec!["bind:MT-v"]);
    assert!(registry.router().is_bound("MT-v"));

    // Departure detaches the sink but keeps the binding parked.
    engine.send(EngineEvent::ParticipantDisconnected(participant("alice")));
    capture.wait_for(5).await;
    assert_eq!(
        *journal.lock().unwrap(),
        vec!["bind:MT-v", "unbind:MT-v"]
    );
    assert!(!registry.router().is_bound("MT-v"));
}
