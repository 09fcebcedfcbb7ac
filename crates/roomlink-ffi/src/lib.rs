//! UniFFI bindings for roomlink-core.
//!
//! Exposes a RoomlinkClient object wrapping the session registry into a
//! single FFI-safe interface. Events cross the boundary as a fixed
//! identifier plus a serialized JSON payload, matching what a
//! JavaScript or Kotlin embedding consumes directly.

use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use roomlink_core::SessionRegistry;
use roomlink_core::engine::{ConnectOptions, MediaEngine};
use roomlink_core::errors::RoomlinkError;
use roomlink_core::events::{RoomEvent, RoomEventListener};
use roomlink_core::sinks::VideoSink;

uniffi::setup_scaffolding!();

/// Initialize tracing/logging. Call once from the host before using
/// RoomlinkClient.
#[uniffi::export]
pub fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                    "roomlink_core=debug,roomlink_ffi=debug"
                        .parse()
                        .expect("default filter is valid")
                }),
            )
            .with_ansi(false)
            .init();
    });
}

// ── Engine registration ──────────────────────────────────────────────
//
// The platform shell links exactly one engine adapter crate, which
// registers itself here during startup. Clients created afterwards
// pick it up automatically.

static GLOBAL_ENGINE: OnceLock<Arc<dyn MediaEngine>> = OnceLock::new();

/// Install the media-engine adapter backing all clients. Rust-side
/// only; not part of the FFI surface.
pub fn register_engine(engine: Arc<dyn MediaEngine>) {
    if GLOBAL_ENGINE.set(engine).is_err() {
        tracing::warn!("media engine already registered, ignoring");
    }
}

// ── FFI-safe types ───────────────────────────────────────────────────

#[derive(Debug, Clone, uniffi::Record)]
pub struct ConnectRequest {
    pub room_name: String,
    pub access_token: String,
    pub enable_audio: bool,
    pub enable_video: bool,
    pub enable_remote_audio: bool,
    pub enable_data_track: bool,
    pub enable_network_quality_reporting: bool,
    pub max_audio_bitrate: u32,
    pub max_video_bitrate: u32,
    pub max_fps: u32,
}

impl From<ConnectRequest> for ConnectOptions {
    fn from(r: ConnectRequest) -> Self {
        Self {
            room_name: r.room_name,
            access_token: r.access_token,
            enable_audio: r.enable_audio,
            enable_video: r.enable_video,
            enable_remote_audio: r.enable_remote_audio,
            enable_data_track: r.enable_data_track,
            enable_network_quality_reporting: r.enable_network_quality_reporting,
            max_audio_bitrate: r.max_audio_bitrate,
            max_video_bitrate: r.max_video_bitrate,
            max_fps: r.max_fps,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct ParticipantRecord {
    pub identity: String,
    pub sid: String,
}

#[derive(Debug, thiserror::Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum ClientError {
    #[error("no media engine registered")]
    EngineMissing,
    #[error("room already open: {room}")]
    DuplicateSession { room: String },
    #[error("{message}")]
    Registry { message: String },
}

impl From<RoomlinkError> for ClientError {
    fn from(e: RoomlinkError) -> Self {
        match e {
            RoomlinkError::DuplicateSession(room) => Self::DuplicateSession { room },
            other => Self::Registry {
                message: other.to_string(),
            },
        }
    }
}

// ── Listener plumbing ────────────────────────────────────────────────

/// Foreign callback receiving the outbound event stream.
#[uniffi::export(with_foreign)]
pub trait RoomlinkListener: Send + Sync {
    fn on_event(&self, name: String, payload: String);
}

struct ListenerBridge {
    inner: Arc<dyn RoomlinkListener>,
}

impl RoomEventListener for ListenerBridge {
    fn on_event(&self, event: RoomEvent) {
        let payload = event.to_json().to_string();
        self.inner.on_event(event.name().to_string(), payload);
    }
}

/// Foreign rendering target for a video track.
#[uniffi::export(with_foreign)]
pub trait VideoSinkHandle: Send + Sync {
    fn on_bind(&self, track_sid: String);
    fn on_unbind(&self, track_sid: String);
}

struct SinkBridge {
    inner: Arc<dyn VideoSinkHandle>,
}

impl VideoSink for SinkBridge {
    fn on_bind(&self, track_sid: &str) {
        self.inner.on_bind(track_sid.to_string());
    }

    fn on_unbind(&self, track_sid: &str) {
        self.inner.on_unbind(track_sid.to_string());
    }
}

// ── Client ───────────────────────────────────────────────────────────

#[derive(uniffi::Object)]
pub struct RoomlinkClient {
    rt: tokio::runtime::Runtime,
    registry: SessionRegistry,
    engine: StdMutex<Option<Arc<dyn MediaEngine>>>,
}

#[uniffi::export]
impl RoomlinkClient {
    #[uniffi::constructor]
    pub fn new() -> Arc<Self> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("failed to create tokio runtime");
        Arc::new(Self {
            rt,
            registry: SessionRegistry::new(),
            engine: StdMutex::new(GLOBAL_ENGINE.get().cloned()),
        })
    }

    pub fn add_listener(&self, listener: Arc<dyn RoomlinkListener>) {
        self.registry
            .add_listener(Arc::new(ListenerBridge { inner: listener }));
    }

    /// Request a room connection. Completes via a later `connected` or
    /// `connectFailure` event, not synchronously.
    pub fn connect(&self, request: ConnectRequest) -> Result<(), ClientError> {
        let engine = self
            .engine
            .lock()
            .expect("engine lock poisoned")
            .clone()
            .ok_or(ClientError::EngineMissing)?;
        self.rt
            .block_on(self.registry.open(engine.as_ref(), request.into()))?;
        Ok(())
    }

    /// Idempotent; a second disconnect for the same room is a no-op.
    pub fn disconnect(&self, room_name: String) {
        self.rt.block_on(self.registry.close(&room_name));
    }

    pub fn disconnect_all(&self) {
        self.rt.block_on(self.registry.close_all());
    }

    pub fn open_rooms(&self) -> Vec<String> {
        self.rt.block_on(self.registry.open_rooms())
    }

    pub fn participants(&self, room_name: String) -> Vec<ParticipantRecord> {
        self.rt.block_on(async {
            match self.registry.lookup(&room_name).await {
                Some(session) => session
                    .participants()
                    .await
                    .into_iter()
                    .map(|p| ParticipantRecord {
                        identity: p.identity,
                        sid: p.sid,
                    })
                    .collect(),
                None => Vec::new(),
            }
        })
    }

    pub fn publish_local_audio(&self, room_name: String, enabled: bool) {
        self.rt.block_on(async {
            match self.registry.lookup(&room_name).await {
                Some(session) => session.publish_local_audio(enabled).await,
                None => tracing::warn!(room = %room_name, "audio toggle for unknown room, ignoring"),
            }
        });
    }

    pub fn publish_local_video(&self, room_name: String, enabled: bool) {
        self.rt.block_on(async {
            match self.registry.lookup(&room_name).await {
                Some(session) => session.publish_local_video(enabled).await,
                None => tracing::warn!(room = %room_name, "video toggle for unknown room, ignoring"),
            }
        });
    }

    pub fn switch_camera(&self, room_name: String) {
        self.rt.block_on(async {
            if let Some(session) = self.registry.lookup(&room_name).await {
                session.switch_camera().await;
            }
        });
    }

    /// Toggle remote audio playback, for one participant or (with no
    /// participant sid) for everyone in the room.
    pub fn set_remote_audio_enabled(
        &self,
        room_name: String,
        participant_sid: Option<String>,
        enabled: bool,
    ) {
        self.rt.block_on(async {
            if let Some(session) = self.registry.lookup(&room_name).await {
                session
                    .set_remote_audio_enabled(participant_sid.as_deref(), enabled)
                    .await;
            }
        });
    }

    pub fn set_remote_video_enabled(
        &self,
        room_name: String,
        participant_sid: String,
        enabled: bool,
    ) {
        self.rt.block_on(async {
            if let Some(session) = self.registry.lookup(&room_name).await {
                session
                    .set_remote_video_enabled(&participant_sid, enabled)
                    .await;
            }
        });
    }

    /// Ask for a stats snapshot; the result arrives as a single
    /// `statsReceived` event.
    pub fn request_stats(&self, room_name: String) {
        self.rt.block_on(async {
            if let Some(session) = self.registry.lookup(&room_name).await {
                session.request_stats();
            }
        });
    }

    pub fn send_data_message(&self, room_name: String, message: String) {
        self.rt.block_on(async {
            if let Some(session) = self.registry.lookup(&room_name).await {
                session.send_data_message(&message).await;
            }
        });
    }

    /// Attach a rendering sink to a video track. Safe to call before
    /// the track is subscribed; the binding applies once it is.
    pub fn bind_video_sink(&self, track_sid: String, sink: Arc<dyn VideoSinkHandle>) {
        self.registry
            .router()
            .bind(&track_sid, Arc::new(SinkBridge { inner: sink }));
    }

    pub fn unbind_video_sink(&self, track_sid: String) {
        self.registry.router().unbind(&track_sid);
    }
}

impl RoomlinkClient {
    /// Rust-side constructor with an explicit engine, bypassing the
    /// global registration. Used by adapter crates and tests.
    pub fn with_engine(engine: Arc<dyn MediaEngine>) -> Arc<Self> {
        let client = Self::new();
        *client.engine.lock().expect("engine lock poisoned") = Some(engine);
        client
    }
}
