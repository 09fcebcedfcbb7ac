use serde::Serialize;

/// Fields common to every per-track stats record.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseTrackStats {
    pub codec: String,
    pub packets_lost: i64,
    pub ssrc: String,
    pub timestamp: f64,
    pub track_sid: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct VideoDimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAudioTrackStats {
    #[serde(flatten)]
    pub base: BaseTrackStats,
    pub bytes_received: u64,
    pub packets_received: u64,
    pub audio_level: i32,
    pub jitter: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVideoTrackStats {
    #[serde(flatten)]
    pub base: BaseTrackStats,
    pub bytes_received: u64,
    pub packets_received: u64,
    pub dimensions: VideoDimensions,
    pub frame_rate: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalAudioTrackStats {
    #[serde(flatten)]
    pub base: BaseTrackStats,
    pub bytes_sent: u64,
    pub packets_sent: u64,
    pub round_trip_time: f64,
    pub audio_level: i32,
    pub jitter: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalVideoTrackStats {
    #[serde(flatten)]
    pub base: BaseTrackStats,
    pub bytes_sent: u64,
    pub packets_sent: u64,
    pub round_trip_time: f64,
    pub dimensions: VideoDimensions,
    pub capture_dimensions: VideoDimensions,
    pub frame_rate: u32,
    pub captured_frame_rate: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidatePairStats {
    pub local_candidate_id: String,
    pub remote_candidate_id: String,
    pub available_outgoing_bitrate: f64,
    pub available_incoming_bitrate: f64,
}

/// One per-connection stats snapshot as delivered by the engine.
///
/// `peer_connection_id` is engine-assigned and opaque; it only serves
/// as the key of the outbound stats map.
#[derive(Debug, Clone, Default)]
pub struct StatsReport {
    pub peer_connection_id: String,
    pub remote_audio_track_stats: Vec<RemoteAudioTrackStats>,
    pub remote_video_track_stats: Vec<RemoteVideoTrackStats>,
    pub local_audio_track_stats: Vec<LocalAudioTrackStats>,
    pub local_video_track_stats: Vec<LocalVideoTrackStats>,
    pub ice_candidate_pair_stats: Vec<IceCandidatePairStats>,
}

/// Value type of the outbound stats map, keyed by peer connection id.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    pub remote_audio_track_stats: Vec<RemoteAudioTrackStats>,
    pub remote_video_track_stats: Vec<RemoteVideoTrackStats>,
    pub local_audio_track_stats: Vec<LocalAudioTrackStats>,
    pub local_video_track_stats: Vec<LocalVideoTrackStats>,
    pub ice_candidate_pair_stats: Vec<IceCandidatePairStats>,
}

impl From<StatsReport> for ConnectionStats {
    fn from(r: StatsReport) -> Self {
        Self {
            remote_audio_track_stats: r.remote_audio_track_stats,
            remote_video_track_stats: r.remote_video_track_stats,
            local_audio_track_stats: r.local_audio_track_stats,
            local_video_track_stats: r.local_video_track_stats,
            ice_candidate_pair_stats: r.ice_candidate_pair_stats,
        }
    }
}
