use uuid::Uuid;

/// Media kind of a published or subscribed track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
    Data,
}

/// A published or subscribed media track, local or remote.
///
/// Flattened view over the engine's track/publication variants: the
/// shared fields live here, the kind is a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub sid: String,
    pub name: String,
    pub kind: TrackKind,
    pub enabled: bool,
}

impl TrackInfo {
    /// Create a locally-originated track with a fresh identifier.
    ///
    /// The engine assigns identifiers to remote tracks; local ones are
    /// minted here before being handed to `publish_track`.
    pub fn local(kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            sid: format!("LT{}", Uuid::new_v4().simple()),
            name: name.into(),
            kind,
            enabled: true,
        }
    }
}

/// Lifecycle phase of a track within a session.
///
/// The expected cycle is Unpublished -> Published -> Subscribed ->
/// Unsubscribed -> Unpublished. Engine callbacks can arrive outside
/// this order; callers apply the transition anyway and log an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackPhase {
    Unpublished,
    Published,
    Subscribed,
    Unsubscribed,
}

impl TrackPhase {
    /// Whether moving to `next` follows the expected lifecycle order.
    pub fn expects(self, next: TrackPhase) -> bool {
        matches!(
            (self, next),
            (TrackPhase::Unpublished, TrackPhase::Published)
                | (TrackPhase::Published, TrackPhase::Subscribed)
                | (TrackPhase::Subscribed, TrackPhase::Unsubscribed)
                | (TrackPhase::Unsubscribed, TrackPhase::Published)
                | (TrackPhase::Unsubscribed, TrackPhase::Unpublished)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_lifecycle_order() {
        assert!(TrackPhase::Unpublished.expects(TrackPhase::Published));
        assert!(TrackPhase::Published.expects(TrackPhase::Subscribed));
        assert!(TrackPhase::Subscribed.expects(TrackPhase::Unsubscribed));
        assert!(TrackPhase::Unsubscribed.expects(TrackPhase::Unpublished));
    }

    #[test]
    fn out_of_order_transitions_flagged() {
        assert!(!TrackPhase::Unpublished.expects(TrackPhase::Subscribed));
        assert!(!TrackPhase::Published.expects(TrackPhase::Unsubscribed));
        assert!(!TrackPhase::Subscribed.expects(TrackPhase::Published));
    }

    #[test]
    fn local_tracks_get_unique_sids() {
        let a = TrackInfo::local(TrackKind::Video, "camera");
        let b = TrackInfo::local(TrackKind::Video, "camera");
        assert_ne!(a.sid, b.sid);
        assert!(a.sid.starts_with("LT"));
        assert!(a.enabled);
    }
}
