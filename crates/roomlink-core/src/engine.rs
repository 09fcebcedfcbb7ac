use std::sync::Arc;

use tokio::sync::mpsc;

use crate::participants::ParticipantInfo;
use crate::stats::StatsReport;
use crate::track::TrackInfo;

/// Options for opening a room, mirroring the knobs the embedding
/// application controls. Media-level interpretation (bitrate caps,
/// quality verbosity) is entirely the engine's business.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub room_name: String,
    pub access_token: String,
    pub enable_audio: bool,
    pub enable_video: bool,
    pub enable_remote_audio: bool,
    pub enable_data_track: bool,
    pub enable_network_quality_reporting: bool,
    /// Kilobits per second.
    pub max_audio_bitrate: u32,
    /// Kilobits per second.
    pub max_video_bitrate: u32,
    pub max_fps: u32,
}

impl ConnectOptions {
    pub fn new(room_name: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            room_name: room_name.into(),
            access_token: access_token.into(),
            enable_audio: true,
            enable_video: true,
            enable_remote_audio: false,
            enable_data_track: false,
            enable_network_quality_reporting: false,
            max_audio_bitrate: 16,
            max_video_bitrate: 100,
            max_fps: 30,
        }
    }
}

/// A remote participant and its already-published tracks, as seeded by
/// the engine at connect time.
#[derive(Debug, Clone)]
pub struct RemoteSeed {
    pub participant: ParticipantInfo,
    pub tracks: Vec<TrackInfo>,
}

/// Callbacks delivered by the media engine, one channel per session.
///
/// The engine serializes delivery per session; the reconciliation layer
/// adds no locking beyond its own map access.
#[derive(Debug)]
pub enum EngineEvent {
    ConnectSucceeded {
        room_sid: String,
        local_participant: ParticipantInfo,
        remote_participants: Vec<RemoteSeed>,
    },
    ConnectFailed {
        error: String,
    },
    Disconnected {
        error: Option<String>,
    },
    ParticipantConnected(ParticipantInfo),
    ParticipantDisconnected(ParticipantInfo),
    TrackPublished {
        participant: String,
        track: TrackInfo,
    },
    TrackUnpublished {
        participant: String,
        track_sid: String,
    },
    TrackSubscribed {
        participant: String,
        track: TrackInfo,
    },
    TrackUnsubscribed {
        participant: String,
        track_sid: String,
    },
    TrackEnabled {
        participant: String,
        track_sid: String,
    },
    TrackDisabled {
        participant: String,
        track_sid: String,
    },
    NetworkQualityChanged {
        participant: String,
        is_local: bool,
        /// Engine ordinal: 0 is "unknown", 1 is the first real level.
        level: u32,
    },
    DataMessage {
        track_sid: String,
        message: String,
    },
    Stats(Vec<StatsReport>),
}

pub type EngineEvents = mpsc::UnboundedReceiver<EngineEvent>;

/// Control surface of one engine-side room connection.
///
/// All methods are fire-and-forget; results surface as [`EngineEvent`]s
/// on the session's channel. `close` must be safe to call while events
/// are still in flight.
pub trait EngineSession: Send + Sync {
    fn close(&self);
    fn publish_track(&self, track: &TrackInfo);
    fn unpublish_track(&self, track_sid: &str);
    /// Enable or disable playback of a subscribed audio track.
    fn set_playback_enabled(&self, track_sid: &str, enabled: bool);
    /// Ask for a stats snapshot; the result arrives as [`EngineEvent::Stats`].
    fn request_stats(&self);
    /// Flip between front and back capture. Returns whether the back
    /// camera is now active.
    fn switch_camera(&self) -> bool;
    fn send_data_message(&self, message: &str);
}

/// The opaque media engine. Everything hard (signaling, ICE, codecs,
/// bandwidth adaptation) lives behind this boundary.
pub trait MediaEngine: Send + Sync {
    /// Request a connection. Success or failure is reported as the
    /// first event on the returned channel, not synchronously.
    fn open(&self, options: &ConnectOptions) -> (Arc<dyn EngineSession>, EngineEvents);
}
