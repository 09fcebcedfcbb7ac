use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::engine::{ConnectOptions, EngineEvent, EngineEvents, EngineSession};
use crate::events::EventEmitter;
use crate::normalize::EventNormalizer;
use crate::participants::{ParticipantInfo, ParticipantTracker};
use crate::sinks::TrackSinkRouter;
use crate::track::{TrackInfo, TrackKind};

/// Cap on queued inbound data-track messages per session. Beyond this
/// the session drops messages rather than stalling callback delivery.
const DATA_MESSAGE_QUEUE_SIZE: usize = 1024;

pub(crate) type SessionMap = Arc<Mutex<HashMap<String, Arc<Session>>>>;

/// One joined room: engine control handle, participant/track state,
/// and the event loop draining the engine's callback channel.
///
/// Created and owned exclusively by the registry.
pub struct Session {
    room_name: String,
    options: ConnectOptions,
    engine: Arc<dyn EngineSession>,
    tracker: Arc<Mutex<ParticipantTracker>>,
    normalizer: Arc<Mutex<EventNormalizer>>,
    emitter: EventEmitter,
    router: TrackSinkRouter,
    local_audio: Mutex<Option<TrackInfo>>,
    local_video: Mutex<Option<TrackInfo>>,
    local_data: Mutex<Option<TrackInfo>>,
    closing: AtomicBool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("room_name", &self.room_name)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn spawn(
        options: ConnectOptions,
        engine: Arc<dyn EngineSession>,
        events: EngineEvents,
        emitter: EventEmitter,
        router: TrackSinkRouter,
        sessions: SessionMap,
    ) -> Arc<Self> {
        let session = Arc::new(Self {
            room_name: options.room_name.clone(),
            normalizer: Arc::new(Mutex::new(EventNormalizer::new(options.room_name.as_str()))),
            options,
            engine,
            tracker: Arc::new(Mutex::new(ParticipantTracker::new())),
            emitter,
            router,
            local_audio: Mutex::new(None),
            local_video: Mutex::new(None),
            local_data: Mutex::new(None),
            closing: AtomicBool::new(false),
        });
        tokio::spawn(Self::event_loop(session.clone(), events, sessions));
        session
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    pub async fn room_sid(&self) -> String {
        self.normalizer.lock().await.room_sid().to_string()
    }

    /// Snapshot of current remote participants.
    pub async fn participants(&self) -> Vec<ParticipantInfo> {
        self.tracker.lock().await.participants()
    }

    pub async fn local_participant(&self) -> Option<ParticipantInfo> {
        self.tracker.lock().await.local().cloned()
    }

    /// Publish or unpublish the local microphone track.
    pub async fn publish_local_audio(&self, enabled: bool) {
        if enabled {
            let mut local = self.local_audio.lock().await;
            if local.is_none() {
                let track = TrackInfo::local(TrackKind::Audio, "microphone");
                self.engine.publish_track(&track);
                *local = Some(track);
            }
        } else if let Some(track) = self.local_audio.lock().await.take() {
            self.engine.unpublish_track(&track.sid);
        }
        let event = self.normalizer.lock().await.audio_changed(enabled);
        self.emitter.emit(event);
    }

    /// Publish or unpublish the local camera track.
    pub async fn publish_local_video(&self, enabled: bool) {
        if enabled {
            let mut local = self.local_video.lock().await;
            if local.is_none() {
                let track = TrackInfo::local(TrackKind::Video, "camera");
                self.engine.publish_track(&track);
                *local = Some(track);
            }
        } else if let Some(track) = self.local_video.lock().await.take() {
            self.engine.unpublish_track(&track.sid);
        }
        let event = self.normalizer.lock().await.video_changed(enabled);
        self.emitter.emit(event);
    }

    pub async fn switch_camera(&self) {
        let is_back = self.engine.switch_camera();
        let event = self.normalizer.lock().await.camera_switched(is_back);
        self.emitter.emit(event);
    }

    /// Toggle playback of remote audio, for one participant (by sid) or
    /// for every remote participant.
    pub async fn set_remote_audio_enabled(&self, participant_sid: Option<&str>, enabled: bool) {
        let sids = {
            let tracker = self.tracker.lock().await;
            match participant_sid {
                Some(psid) => match tracker.get_by_sid(psid) {
                    Some(p) => p.track_sids_of_kind(TrackKind::Audio),
                    None => {
                        tracing::warn!(participant = psid, "audio toggle for unknown participant, ignoring");
                        Vec::new()
                    }
                },
                None => tracker
                    .participants()
                    .iter()
                    .filter_map(|p| tracker.get(&p.identity))
                    .flat_map(|s| s.track_sids_of_kind(TrackKind::Audio))
                    .collect(),
            }
        };
        for sid in sids {
            self.engine.set_playback_enabled(&sid, enabled);
        }
    }

    /// Toggle rendering of a participant's video tracks. Enabling
    /// forces a detach/reattach on the bound sink so the track never
    /// ends up feeding it twice.
    pub async fn set_remote_video_enabled(&self, participant_sid: &str, enabled: bool) {
        let sids = {
            let tracker = self.tracker.lock().await;
            match tracker.get_by_sid(participant_sid) {
                Some(p) => p.track_sids_of_kind(TrackKind::Video),
                None => {
                    tracing::warn!(participant = participant_sid, "video toggle for unknown participant, ignoring");
                    Vec::new()
                }
            }
        };
        for sid in sids {
            if enabled {
                self.router.resume(&sid);
            } else {
                self.router.suspend(&sid);
            }
        }
    }

    /// Ask the engine for a stats snapshot; the result arrives later as
    /// a single batched statsReceived event.
    pub fn request_stats(&self) {
        self.engine.request_stats();
    }

    pub async fn send_data_message(&self, message: &str) {
        if self.local_data.lock().await.is_some() {
            self.engine.send_data_message(message);
        } else {
            tracing::debug!(room = %self.room_name, "no local data track, dropping outbound message");
        }
    }

    pub(crate) fn shutdown(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.engine.close();
    }

    async fn remove_from_registry(session: &Arc<Session>, sessions: &SessionMap) {
        let mut map = sessions.lock().await;
        // Guard against a close/reopen race: only remove the entry if
        // it still points at this session.
        if let Some(current) = map.get(&session.room_name) {
            if Arc::ptr_eq(current, session) {
                map.remove(&session.room_name);
            }
        }
    }

    async fn event_loop(session: Arc<Session>, mut events: EngineEvents, sessions: SessionMap) {
        // Dedicated worker for inbound data-track messages, so slow
        // listener handling never blocks delivery of other callbacks.
        let (data_tx, mut data_rx) = mpsc::channel::<(String, String)>(DATA_MESSAGE_QUEUE_SIZE);
        let worker = {
            let session = session.clone();
            tokio::spawn(async move {
                while let Some((track_sid, message)) = data_rx.recv().await {
                    let event = session
                        .normalizer
                        .lock()
                        .await
                        .data_message(&track_sid, &message);
                    session.emitter.emit(event);
                }
            })
        };

        while let Some(event) = events.recv().await {
            // After an explicit close, only the engine's terminal
            // events matter; in-flight callbacks for the closed
            // session are discarded silently.
            if session.closing.load(Ordering::SeqCst)
                && !matches!(
                    &event,
                    EngineEvent::Disconnected { .. } | EngineEvent::ConnectFailed { .. }
                )
            {
                tracing::debug!(room = %session.room_name, "dropping callback for closed session");
                continue;
            }
            match event {
                EngineEvent::ConnectSucceeded {
                    room_sid,
                    local_participant,
                    remote_participants,
                } => {
                    tracing::info!(room = %session.room_name, %room_sid, "connected");
                    session.normalizer.lock().await.set_room_sid(room_sid);

                    let remotes = {
                        let mut tracker = session.tracker.lock().await;
                        tracker.set_local(local_participant.clone());
                        let mut remotes = Vec::new();
                        for seed in remote_participants {
                            if tracker.upsert(seed.participant.clone()) {
                                tracker.seed_tracks(&seed.participant.identity, seed.tracks);
                            }
                            remotes.push(seed.participant);
                        }
                        remotes
                    };

                    let event = session
                        .normalizer
                        .lock()
                        .await
                        .connected(&remotes, &local_participant);
                    session.emitter.emit(event);

                    if session.options.enable_data_track {
                        let track = TrackInfo::local(TrackKind::Data, "messages");
                        session.engine.publish_track(&track);
                        *session.local_data.lock().await = Some(track);
                    }
                }

                EngineEvent::ConnectFailed { error } => {
                    tracing::warn!(room = %session.room_name, %error, "connect failed");
                    let event = session.normalizer.lock().await.connect_failure(error);
                    session.emitter.emit(event);
                    Self::remove_from_registry(&session, &sessions).await;
                    break;
                }

                EngineEvent::Disconnected { error } => {
                    tracing::info!(room = %session.room_name, "disconnected");
                    let (local_identity, video_tracks) = {
                        let mut tracker = session.tracker.lock().await;
                        let local = tracker.local().map(|p| p.identity.clone());
                        let mut vids = Vec::new();
                        for p in tracker.participants() {
                            if let Some(state) = tracker.get(&p.identity) {
                                vids.extend(state.track_sids_of_kind(TrackKind::Video));
                            }
                        }
                        tracker.clear();
                        (local, vids)
                    };
                    for sid in video_tracks {
                        session.router.track_lost(&sid);
                    }
                    let event = session
                        .normalizer
                        .lock()
                        .await
                        .disconnected(local_identity, error);
                    session.emitter.emit(event);
                    Self::remove_from_registry(&session, &sessions).await;
                    break;
                }

                EngineEvent::ParticipantConnected(info) => {
                    let is_new = session.tracker.lock().await.upsert(info.clone());
                    if is_new {
                        let event = session.normalizer.lock().await.participant_connected(&info);
                        session.emitter.emit(event);
                    }
                }

                EngineEvent::ParticipantDisconnected(info) => {
                    let removed = session.tracker.lock().await.remove(&info.identity);
                    if let Some((info, tracks)) = removed {
                        // Per-track removals first, then the participant.
                        let mut out = Vec::with_capacity(tracks.len() + 1);
                        {
                            let normalizer = session.normalizer.lock().await;
                            for track in &tracks {
                                if track.kind == TrackKind::Video {
                                    session.router.track_lost(&track.sid);
                                }
                                out.push(normalizer.track_removed(&info, track));
                            }
                            out.push(normalizer.participant_disconnected(&info));
                        }
                        for event in out {
                            session.emitter.emit(event);
                        }
                    }
                }

                EngineEvent::TrackPublished { participant, track } => {
                    session
                        .tracker
                        .lock()
                        .await
                        .track_published(&participant, track);
                }

                EngineEvent::TrackUnpublished {
                    participant,
                    track_sid,
                } => {
                    session
                        .tracker
                        .lock()
                        .await
                        .track_unpublished(&participant, &track_sid);
                }

                EngineEvent::TrackSubscribed { participant, track } => {
                    let (owner, track) = {
                        let mut tracker = session.tracker.lock().await;
                        let track = tracker.track_subscribed(&participant, track);
                        let owner = tracker.get(&participant).map(|s| s.info.clone());
                        (owner, track)
                    };
                    if let (Some(owner), Some(track)) = (owner, track) {
                        match track.kind {
                            TrackKind::Video => session.router.track_available(&track.sid),
                            TrackKind::Audio => session
                                .engine
                                .set_playback_enabled(&track.sid, session.options.enable_remote_audio),
                            TrackKind::Data => {}
                        }
                        let event = session.normalizer.lock().await.track_added(&owner, &track);
                        session.emitter.emit(event);
                    }
                }

                EngineEvent::TrackUnsubscribed {
                    participant,
                    track_sid,
                } => {
                    let (owner, track) = {
                        let mut tracker = session.tracker.lock().await;
                        let track = tracker.track_unsubscribed(&participant, &track_sid);
                        let owner = tracker.get(&participant).map(|s| s.info.clone());
                        (owner, track)
                    };
                    if let (Some(owner), Some(track)) = (owner, track) {
                        if track.kind == TrackKind::Video {
                            session.router.track_lost(&track.sid);
                        }
                        let event = session.normalizer.lock().await.track_removed(&owner, &track);
                        session.emitter.emit(event);
                    }
                }

                EngineEvent::TrackEnabled {
                    participant,
                    track_sid,
                } => {
                    Self::handle_enable_toggle(&session, &participant, &track_sid, true).await;
                }

                EngineEvent::TrackDisabled {
                    participant,
                    track_sid,
                } => {
                    Self::handle_enable_toggle(&session, &participant, &track_sid, false).await;
                }

                EngineEvent::NetworkQualityChanged {
                    participant,
                    is_local,
                    level,
                } => {
                    let info = {
                        let tracker = session.tracker.lock().await;
                        if is_local {
                            tracker.local().cloned()
                        } else {
                            tracker.get(&participant).map(|s| s.info.clone())
                        }
                    };
                    match info {
                        Some(info) => {
                            let event = session
                                .normalizer
                                .lock()
                                .await
                                .network_quality(&info, is_local, level);
                            if let Some(event) = event {
                                session.emitter.emit(event);
                            }
                        }
                        None => tracing::warn!(
                            participant = %participant,
                            "quality change for unknown participant, ignoring"
                        ),
                    }
                }

                EngineEvent::DataMessage { track_sid, message } => {
                    if let Err(err) = data_tx.try_send((track_sid, message)) {
                        match err {
                            mpsc::error::TrySendError::Full(_) => tracing::warn!(
                                room = %session.room_name,
                                "data message queue full, dropping message"
                            ),
                            mpsc::error::TrySendError::Closed(_) => tracing::warn!(
                                room = %session.room_name,
                                "data message worker gone, dropping message"
                            ),
                        }
                    }
                }

                EngineEvent::Stats(reports) => {
                    let event = session.normalizer.lock().await.stats(reports);
                    session.emitter.emit(event);
                }
            }
        }

        drop(data_tx);
        let _ = worker.await;
        tracing::info!(room = %session.room_name, "session event loop ended");
    }

    async fn handle_enable_toggle(
        session: &Arc<Session>,
        participant: &str,
        track_sid: &str,
        enabled: bool,
    ) {
        let (owner, track) = {
            let mut tracker = session.tracker.lock().await;
            let track = tracker.set_track_enabled(participant, track_sid, enabled);
            let owner = tracker.get(participant).map(|s| s.info.clone());
            (owner, track)
        };
        if let (Some(owner), Some(track)) = (owner, track) {
            let event = session
                .normalizer
                .lock()
                .await
                .track_enabled(&owner, &track, enabled);
            if let Some(event) = event {
                session.emitter.emit(event);
            }
        }
    }
}
