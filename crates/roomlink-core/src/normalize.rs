use std::collections::BTreeMap;

use crate::events::{ParticipantPayload, RoomEvent, TrackPayload};
use crate::participants::ParticipantInfo;
use crate::stats::StatsReport;
use crate::track::{TrackInfo, TrackKind};

/// Convert an engine quality ordinal to the emitted zero-based level.
///
/// The engine reserves ordinal 0 for "unknown" and starts real levels
/// at 1, so the emitted value is the ordinal minus one and ordinal 0
/// maps to no emission at all.
pub fn quality_level(ordinal: u32) -> Option<u32> {
    ordinal.checked_sub(1)
}

/// Builds outbound events with stable field shapes for one session.
#[derive(Debug)]
pub struct EventNormalizer {
    room_name: String,
    room_sid: String,
}

impl EventNormalizer {
    pub fn new(room_name: impl Into<String>) -> Self {
        Self {
            room_name: room_name.into(),
            room_sid: String::new(),
        }
    }

    /// The room server id is only known once the engine connects.
    pub fn set_room_sid(&mut self, room_sid: impl Into<String>) {
        self.room_sid = room_sid.into();
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    pub fn room_sid(&self) -> &str {
        &self.room_sid
    }

    fn participant(info: &ParticipantInfo) -> ParticipantPayload {
        ParticipantPayload {
            identity: info.identity.clone(),
            sid: info.sid.clone(),
        }
    }

    fn track(info: &TrackInfo) -> TrackPayload {
        TrackPayload {
            track_sid: info.sid.clone(),
            track_name: info.name.clone(),
            enabled: info.enabled,
        }
    }

    /// The connected payload lists every seeded remote participant plus
    /// the local participant; no separate participantConnected events
    /// follow for these.
    pub fn connected(
        &self,
        remotes: &[ParticipantInfo],
        local: &ParticipantInfo,
    ) -> RoomEvent {
        let mut participants: Vec<ParticipantPayload> =
            remotes.iter().map(Self::participant).collect();
        participants.push(Self::participant(local));
        RoomEvent::Connected {
            room_name: self.room_name.clone(),
            room_sid: self.room_sid.clone(),
            participants,
        }
    }

    pub fn connect_failure(&self, error: impl Into<String>) -> RoomEvent {
        RoomEvent::ConnectFailure {
            room_name: self.room_name.clone(),
            room_sid: self.room_sid.clone(),
            error: error.into(),
        }
    }

    pub fn disconnected(
        &self,
        local_identity: Option<String>,
        error: Option<String>,
    ) -> RoomEvent {
        RoomEvent::Disconnected {
            room_name: self.room_name.clone(),
            room_sid: self.room_sid.clone(),
            participant: local_identity,
            error,
        }
    }

    pub fn participant_connected(&self, info: &ParticipantInfo) -> RoomEvent {
        RoomEvent::ParticipantConnected {
            room_name: self.room_name.clone(),
            room_sid: self.room_sid.clone(),
            participant: Self::participant(info),
        }
    }

    pub fn participant_disconnected(&self, info: &ParticipantInfo) -> RoomEvent {
        RoomEvent::ParticipantDisconnected {
            room_name: self.room_name.clone(),
            room_sid: self.room_sid.clone(),
            participant: Self::participant(info),
        }
    }

    pub fn track_added(&self, participant: &ParticipantInfo, track: &TrackInfo) -> RoomEvent {
        let room_name = self.room_name.clone();
        let room_sid = self.room_sid.clone();
        let participant = Self::participant(participant);
        let track_payload = Self::track(track);
        match track.kind {
            TrackKind::Audio => RoomEvent::ParticipantAddedAudioTrack {
                room_name,
                room_sid,
                participant,
                track: track_payload,
            },
            TrackKind::Video => RoomEvent::ParticipantAddedVideoTrack {
                room_name,
                room_sid,
                participant,
                track: track_payload,
            },
            TrackKind::Data => RoomEvent::ParticipantAddedDataTrack {
                room_name,
                room_sid,
                participant,
                track: track_payload,
            },
        }
    }

    pub fn track_removed(&self, participant: &ParticipantInfo, track: &TrackInfo) -> RoomEvent {
        let room_name = self.room_name.clone();
        let room_sid = self.room_sid.clone();
        let participant = Self::participant(participant);
        let track_payload = Self::track(track);
        match track.kind {
            TrackKind::Audio => RoomEvent::ParticipantRemovedAudioTrack {
                room_name,
                room_sid,
                participant,
                track: track_payload,
            },
            TrackKind::Video => RoomEvent::ParticipantRemovedVideoTrack {
                room_name,
                room_sid,
                participant,
                track: track_payload,
            },
            TrackKind::Data => RoomEvent::ParticipantRemovedDataTrack {
                room_name,
                room_sid,
                participant,
                track: track_payload,
            },
        }
    }

    /// Enabled/disabled toggles only exist for audio and video tracks;
    /// a data track toggle has no outbound counterpart.
    pub fn track_enabled(
        &self,
        participant: &ParticipantInfo,
        track: &TrackInfo,
        enabled: bool,
    ) -> Option<RoomEvent> {
        let room_name = self.room_name.clone();
        let room_sid = self.room_sid.clone();
        let participant = Self::participant(participant);
        let track_payload = Self::track(track);
        match (track.kind, enabled) {
            (TrackKind::Audio, true) => Some(RoomEvent::ParticipantEnabledAudioTrack {
                room_name,
                room_sid,
                participant,
                track: track_payload,
            }),
            (TrackKind::Audio, false) => Some(RoomEvent::ParticipantDisabledAudioTrack {
                room_name,
                room_sid,
                participant,
                track: track_payload,
            }),
            (TrackKind::Video, true) => Some(RoomEvent::ParticipantEnabledVideoTrack {
                room_name,
                room_sid,
                participant,
                track: track_payload,
            }),
            (TrackKind::Video, false) => Some(RoomEvent::ParticipantDisabledVideoTrack {
                room_name,
                room_sid,
                participant,
                track: track_payload,
            }),
            (TrackKind::Data, _) => {
                tracing::warn!(track = %track.sid, "enable toggle on data track, ignoring");
                None
            }
        }
    }

    pub fn data_message(&self, track_sid: &str, message: &str) -> RoomEvent {
        RoomEvent::DataTrackMessageReceived {
            room_name: self.room_name.clone(),
            room_sid: self.room_sid.clone(),
            track_sid: track_sid.to_string(),
            message: message.to_string(),
        }
    }

    /// Quality ordinal 0 means "unknown" and produces no event.
    pub fn network_quality(
        &self,
        participant: &ParticipantInfo,
        is_local: bool,
        ordinal: u32,
    ) -> Option<RoomEvent> {
        let quality = quality_level(ordinal)?;
        Some(RoomEvent::NetworkQualityLevelsChanged {
            room_name: self.room_name.clone(),
            room_sid: self.room_sid.clone(),
            participant: Self::participant(participant),
            is_local_user: is_local,
            quality,
        })
    }

    /// Reshape the per-connection report list into a map keyed by the
    /// opaque peer connection id. Numeric fields pass through unchanged.
    pub fn stats(&self, reports: Vec<StatsReport>) -> RoomEvent {
        let connections: BTreeMap<_, _> = reports
            .into_iter()
            .map(|r| {
                let key = r.peer_connection_id.clone();
                (key, r.into())
            })
            .collect();
        RoomEvent::StatsReceived {
            room_name: self.room_name.clone(),
            room_sid: self.room_sid.clone(),
            connections,
        }
    }

    pub fn video_changed(&self, enabled: bool) -> RoomEvent {
        RoomEvent::VideoChanged {
            room_name: self.room_name.clone(),
            room_sid: self.room_sid.clone(),
            video_enabled: enabled,
        }
    }

    pub fn audio_changed(&self, enabled: bool) -> RoomEvent {
        RoomEvent::AudioChanged {
            room_name: self.room_name.clone(),
            room_sid: self.room_sid.clone(),
            audio_enabled: enabled,
        }
    }

    pub fn camera_switched(&self, is_back_camera: bool) -> RoomEvent {
        RoomEvent::CameraSwitched {
            room_name: self.room_name.clone(),
            room_sid: self.room_sid.clone(),
            is_back_camera,
        }
    }
}
