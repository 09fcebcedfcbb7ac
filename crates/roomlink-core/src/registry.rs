use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::engine::{ConnectOptions, MediaEngine};
use crate::errors::RoomlinkError;
use crate::events::{EventEmitter, RoomEventListener};
use crate::session::{Session, SessionMap};
use crate::sinks::TrackSinkRouter;

/// Process-wide map from room name to active session.
///
/// Sole owner of session lifetime: sessions are created by `open`,
/// destroyed by `close` or by the engine reporting disconnection.
/// Injectable service rather than an ambient global; the embedding
/// shell constructs one and ties it to its own lifecycle.
pub struct SessionRegistry {
    sessions: SessionMap,
    emitter: EventEmitter,
    router: TrackSinkRouter,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            emitter: EventEmitter::new(),
            router: TrackSinkRouter::new(),
        }
    }

    /// Register a listener for the outbound event stream.
    pub fn add_listener(&self, listener: Arc<dyn RoomEventListener>) {
        self.emitter.add_listener(listener);
    }

    /// The sink router shared by all sessions. UI glue binds rendering
    /// sinks through this, independent of room membership.
    pub fn router(&self) -> TrackSinkRouter {
        self.router.clone()
    }

    /// Request a connection to a room.
    ///
    /// Returns the session immediately; connect success or failure
    /// arrives later as a `connected` or `connectFailure` event. Fails
    /// synchronously only when the room is already open.
    pub async fn open(
        &self,
        engine: &dyn MediaEngine,
        options: ConnectOptions,
    ) -> Result<Arc<Session>, RoomlinkError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&options.room_name) {
            return Err(RoomlinkError::DuplicateSession(options.room_name.clone()));
        }
        tracing::info!(room = %options.room_name, "opening room");
        let room_name = options.room_name.clone();
        let (engine_session, events) = engine.open(&options);
        let session = Session::spawn(
            options,
            engine_session,
            events,
            self.emitter.clone(),
            self.router.clone(),
            self.sessions.clone(),
        );
        sessions.insert(room_name, session.clone());
        Ok(session)
    }

    /// Close a room. Idempotent: closing an unknown or already-closed
    /// room is a no-op and emits nothing. The `disconnected` event is
    /// emitted once, when the engine confirms.
    pub async fn close(&self, room_name: &str) {
        let session = self.sessions.lock().await.remove(room_name);
        match session {
            Some(session) => {
                tracing::info!(room = room_name, "closing room");
                session.shutdown();
            }
            None => tracing::debug!(room = room_name, "close for unknown room, ignoring"),
        }
    }

    pub async fn lookup(&self, room_name: &str) -> Option<Arc<Session>> {
        self.sessions.lock().await.get(room_name).cloned()
    }

    pub async fn open_rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        rooms.sort();
        rooms
    }

    /// Tear down every open session (host going away).
    pub async fn close_all(&self) {
        let sessions: Vec<Arc<Session>> =
            self.sessions.lock().await.drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.shutdown();
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
