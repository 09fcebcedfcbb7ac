use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::stats::ConnectionStats;

/// Participant sub-object carried by outbound events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantPayload {
    pub identity: String,
    pub sid: String,
}

/// Track sub-object carried by outbound events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPayload {
    pub track_sid: String,
    pub track_name: String,
    pub enabled: bool,
}

/// Ordered event stream delivered to the embedding application.
///
/// Serializes to the stable `{type, roomName, roomSid, ...}` shape;
/// optional fields are omitted entirely when absent, never null.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RoomEvent {
    Connected {
        room_name: String,
        room_sid: String,
        participants: Vec<ParticipantPayload>,
    },
    ConnectFailure {
        room_name: String,
        room_sid: String,
        error: String,
    },
    Disconnected {
        room_name: String,
        room_sid: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        participant: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ParticipantConnected {
        room_name: String,
        room_sid: String,
        participant: ParticipantPayload,
    },
    ParticipantDisconnected {
        room_name: String,
        room_sid: String,
        participant: ParticipantPayload,
    },
    ParticipantAddedAudioTrack {
        room_name: String,
        room_sid: String,
        participant: ParticipantPayload,
        track: TrackPayload,
    },
    ParticipantRemovedAudioTrack {
        room_name: String,
        room_sid: String,
        participant: ParticipantPayload,
        track: TrackPayload,
    },
    ParticipantAddedVideoTrack {
        room_name: String,
        room_sid: String,
        participant: ParticipantPayload,
        track: TrackPayload,
    },
    ParticipantRemovedVideoTrack {
        room_name: String,
        room_sid: String,
        participant: ParticipantPayload,
        track: TrackPayload,
    },
    ParticipantAddedDataTrack {
        room_name: String,
        room_sid: String,
        participant: ParticipantPayload,
        track: TrackPayload,
    },
    ParticipantRemovedDataTrack {
        room_name: String,
        room_sid: String,
        participant: ParticipantPayload,
        track: TrackPayload,
    },
    ParticipantEnabledAudioTrack {
        room_name: String,
        room_sid: String,
        participant: ParticipantPayload,
        track: TrackPayload,
    },
    ParticipantDisabledAudioTrack {
        room_name: String,
        room_sid: String,
        participant: ParticipantPayload,
        track: TrackPayload,
    },
    ParticipantEnabledVideoTrack {
        room_name: String,
        room_sid: String,
        participant: ParticipantPayload,
        track: TrackPayload,
    },
    ParticipantDisabledVideoTrack {
        room_name: String,
        room_sid: String,
        participant: ParticipantPayload,
        track: TrackPayload,
    },
    DataTrackMessageReceived {
        room_name: String,
        room_sid: String,
        track_sid: String,
        message: String,
    },
    NetworkQualityLevelsChanged {
        room_name: String,
        room_sid: String,
        participant: ParticipantPayload,
        is_local_user: bool,
        quality: u32,
    },
    StatsReceived {
        room_name: String,
        room_sid: String,
        #[serde(flatten)]
        connections: BTreeMap<String, ConnectionStats>,
    },
    VideoChanged {
        room_name: String,
        room_sid: String,
        video_enabled: bool,
    },
    AudioChanged {
        room_name: String,
        room_sid: String,
        audio_enabled: bool,
    },
    CameraSwitched {
        room_name: String,
        room_sid: String,
        is_back_camera: bool,
    },
}

impl RoomEvent {
    /// Fixed identifier naming this event kind on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            RoomEvent::Connected { .. } => "connected",
            RoomEvent::ConnectFailure { .. } => "connectFailure",
            RoomEvent::Disconnected { .. } => "disconnected",
            RoomEvent::ParticipantConnected { .. } => "participantConnected",
            RoomEvent::ParticipantDisconnected { .. } => "participantDisconnected",
            RoomEvent::ParticipantAddedAudioTrack { .. } => "participantAddedAudioTrack",
            RoomEvent::ParticipantRemovedAudioTrack { .. } => "participantRemovedAudioTrack",
            RoomEvent::ParticipantAddedVideoTrack { .. } => "participantAddedVideoTrack",
            RoomEvent::ParticipantRemovedVideoTrack { .. } => "participantRemovedVideoTrack",
            RoomEvent::ParticipantAddedDataTrack { .. } => "participantAddedDataTrack",
            RoomEvent::ParticipantRemovedDataTrack { .. } => "participantRemovedDataTrack",
            RoomEvent::ParticipantEnabledAudioTrack { .. } => "participantEnabledAudioTrack",
            RoomEvent::ParticipantDisabledAudioTrack { .. } => "participantDisabledAudioTrack",
            RoomEvent::ParticipantEnabledVideoTrack { .. } => "participantEnabledVideoTrack",
            RoomEvent::ParticipantDisabledVideoTrack { .. } => "participantDisabledVideoTrack",
            RoomEvent::DataTrackMessageReceived { .. } => "dataTrackMessageReceived",
            RoomEvent::NetworkQualityLevelsChanged { .. } => "networkQualityLevelsChanged",
            RoomEvent::StatsReceived { .. } => "statsReceived",
            RoomEvent::VideoChanged { .. } => "videoChanged",
            RoomEvent::AudioChanged { .. } => "audioChanged",
            RoomEvent::CameraSwitched { .. } => "cameraSwitched",
        }
    }

    /// Serialize to the outbound JSON payload.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Trait for receiving events from the reconciliation layer.
/// Implementations must be Send + Sync (called from tokio tasks).
pub trait RoomEventListener: Send + Sync {
    fn on_event(&self, event: RoomEvent);
}

/// Internal event emitter that dispatches to registered listeners.
#[derive(Clone)]
pub struct EventEmitter {
    listeners: Arc<std::sync::RwLock<Vec<Arc<dyn RoomEventListener>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(std::sync::RwLock::new(Vec::new())),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn RoomEventListener>) {
        self.listeners.write().unwrap().push(listener);
    }

    pub fn emit(&self, event: RoomEvent) {
        let listeners = self.listeners.read().unwrap();
        for listener in listeners.iter() {
            listener.on_event(event.clone());
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
