use std::collections::HashMap;

use crate::track::{TrackInfo, TrackKind, TrackPhase};

/// Identity and server id of a room member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantInfo {
    pub identity: String,
    pub sid: String,
}

#[derive(Debug, Clone)]
struct TrackState {
    info: TrackInfo,
    phase: TrackPhase,
}

/// One remote participant and its track set.
#[derive(Debug, Clone)]
pub struct ParticipantState {
    pub info: ParticipantInfo,
    tracks: HashMap<String, TrackState>,
}

impl ParticipantState {
    fn new(info: ParticipantInfo) -> Self {
        Self {
            info,
            tracks: HashMap::new(),
        }
    }

    /// Tracks in a stable order (sorted by sid).
    pub fn tracks(&self) -> Vec<TrackInfo> {
        let mut tracks: Vec<TrackInfo> =
            self.tracks.values().map(|t| t.info.clone()).collect();
        tracks.sort_by(|a, b| a.sid.cmp(&b.sid));
        tracks
    }

    pub fn track_sids_of_kind(&self, kind: TrackKind) -> Vec<String> {
        let mut sids: Vec<String> = self
            .tracks
            .values()
            .filter(|t| t.info.kind == kind)
            .map(|t| t.info.sid.clone())
            .collect();
        sids.sort();
        sids
    }
}

/// Reconciles engine add/remove callbacks into the per-session
/// participant and track state.
///
/// Participants are keyed by identity; duplicate adds update in place.
/// Entries are only ever created from engine-sourced events, never
/// inferred from track callbacks.
#[derive(Debug, Default)]
pub struct ParticipantTracker {
    local: Option<ParticipantInfo>,
    remotes: HashMap<String, ParticipantState>,
}

impl ParticipantTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_local(&mut self, info: ParticipantInfo) {
        self.local = Some(info);
    }

    pub fn local(&self) -> Option<&ParticipantInfo> {
        self.local.as_ref()
    }

    /// Add a participant, or update it in place if the identity is
    /// already tracked. Returns true when the participant is new.
    pub fn upsert(&mut self, info: ParticipantInfo) -> bool {
        match self.remotes.get_mut(&info.identity) {
            Some(existing) => {
                tracing::warn!(
                    identity = %info.identity,
                    "duplicate participant add, updating in place"
                );
                existing.info = info;
                false
            }
            None => {
                self.remotes
                    .insert(info.identity.clone(), ParticipantState::new(info));
                true
            }
        }
    }

    /// Remove a participant, returning its info and the tracks it still
    /// held, in a stable order. The caller emits per-track removals
    /// before the participant-removed event.
    pub fn remove(&mut self, identity: &str) -> Option<(ParticipantInfo, Vec<TrackInfo>)> {
        match self.remotes.remove(identity) {
            Some(state) => {
                let tracks = state.tracks();
                Some((state.info, tracks))
            }
            None => {
                tracing::warn!(identity, "remove for unknown participant, ignoring");
                None
            }
        }
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.remotes.contains_key(identity)
    }

    pub fn get(&self, identity: &str) -> Option<&ParticipantState> {
        self.remotes.get(identity)
    }

    pub fn get_by_sid(&self, sid: &str) -> Option<&ParticipantState> {
        self.remotes.values().find(|p| p.info.sid == sid)
    }

    /// Remote participants in a stable order (sorted by identity).
    pub fn participants(&self) -> Vec<ParticipantInfo> {
        let mut participants: Vec<ParticipantInfo> =
            self.remotes.values().map(|p| p.info.clone()).collect();
        participants.sort_by(|a, b| a.identity.cmp(&b.identity));
        participants
    }

    pub fn participant_count(&self) -> usize {
        self.remotes.len()
    }

    /// Seed a participant's already-published tracks at connect time.
    pub fn seed_tracks(&mut self, identity: &str, tracks: Vec<TrackInfo>) {
        if let Some(p) = self.remotes.get_mut(identity) {
            for info in tracks {
                p.tracks.insert(
                    info.sid.clone(),
                    TrackState {
                        info,
                        phase: TrackPhase::Published,
                    },
                );
            }
        }
    }

    pub fn track_published(&mut self, identity: &str, info: TrackInfo) {
        let Some(p) = self.remotes.get_mut(identity) else {
            tracing::warn!(identity, track = %info.sid, "publish for unknown participant, ignoring");
            return;
        };
        match p.tracks.get_mut(&info.sid) {
            Some(state) => {
                if !state.phase.expects(TrackPhase::Published) {
                    tracing::warn!(
                        identity,
                        track = %info.sid,
                        from = ?state.phase,
                        "anomalous publish ordering"
                    );
                }
                state.info = info;
                state.phase = TrackPhase::Published;
            }
            None => {
                p.tracks.insert(
                    info.sid.clone(),
                    TrackState {
                        info,
                        phase: TrackPhase::Published,
                    },
                );
            }
        }
    }

    pub fn track_unpublished(&mut self, identity: &str, track_sid: &str) -> Option<TrackInfo> {
        let Some(p) = self.remotes.get_mut(identity) else {
            tracing::warn!(identity, track = track_sid, "unpublish for unknown participant, ignoring");
            return None;
        };
        match p.tracks.remove(track_sid) {
            Some(state) => {
                if !state.phase.expects(TrackPhase::Unpublished) {
                    tracing::warn!(
                        identity,
                        track = track_sid,
                        from = ?state.phase,
                        "anomalous unpublish ordering"
                    );
                }
                Some(state.info)
            }
            None => {
                tracing::warn!(identity, track = track_sid, "unpublish for unknown track, ignoring");
                None
            }
        }
    }

    /// Mark a track subscribed, creating the entry defensively if the
    /// subscribe arrived before its publish. Returns the track for
    /// event emission, or None when the participant is unknown.
    pub fn track_subscribed(&mut self, identity: &str, info: TrackInfo) -> Option<TrackInfo> {
        let Some(p) = self.remotes.get_mut(identity) else {
            tracing::warn!(identity, track = %info.sid, "subscribe for unknown participant, ignoring");
            return None;
        };
        match p.tracks.get_mut(&info.sid) {
            Some(state) => {
                if !state.phase.expects(TrackPhase::Subscribed) {
                    tracing::warn!(
                        identity,
                        track = %info.sid,
                        from = ?state.phase,
                        "anomalous subscribe ordering"
                    );
                }
                state.info = info.clone();
                state.phase = TrackPhase::Subscribed;
            }
            None => {
                tracing::warn!(identity, track = %info.sid, "subscribe before publish");
                p.tracks.insert(
                    info.sid.clone(),
                    TrackState {
                        info: info.clone(),
                        phase: TrackPhase::Subscribed,
                    },
                );
            }
        }
        Some(info)
    }

    pub fn track_unsubscribed(&mut self, identity: &str, track_sid: &str) -> Option<TrackInfo> {
        let Some(p) = self.remotes.get_mut(identity) else {
            tracing::warn!(identity, track = track_sid, "unsubscribe for unknown participant, ignoring");
            return None;
        };
        match p.tracks.get_mut(track_sid) {
            Some(state) => {
                if !state.phase.expects(TrackPhase::Unsubscribed) {
                    tracing::warn!(
                        identity,
                        track = track_sid,
                        from = ?state.phase,
                        "anomalous unsubscribe ordering"
                    );
                }
                state.phase = TrackPhase::Unsubscribed;
                Some(state.info.clone())
            }
            None => {
                tracing::warn!(identity, track = track_sid, "unsubscribe for unknown track, ignoring");
                None
            }
        }
    }

    pub fn set_track_enabled(
        &mut self,
        identity: &str,
        track_sid: &str,
        enabled: bool,
    ) -> Option<TrackInfo> {
        let Some(p) = self.remotes.get_mut(identity) else {
            tracing::warn!(identity, track = track_sid, "enable toggle for unknown participant, ignoring");
            return None;
        };
        match p.tracks.get_mut(track_sid) {
            Some(state) => {
                state.info.enabled = enabled;
                Some(state.info.clone())
            }
            None => {
                tracing::warn!(identity, track = track_sid, "enable toggle for unknown track, ignoring");
                None
            }
        }
    }

    pub fn clear(&mut self) {
        self.local = None;
        self.remotes.clear();
    }
}
