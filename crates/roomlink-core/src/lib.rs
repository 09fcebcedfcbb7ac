//! Roomlink core: session-state reconciliation and event normalization
//! in front of an opaque media engine.
//!
//! Tracks which rooms, participants, and tracks are live and emits a
//! deterministic, de-duplicated event stream to the embedding
//! application. Everything media-related (signaling, ICE, codecs,
//! bandwidth adaptation) lives behind the [`engine::MediaEngine`]
//! capability boundary.

pub mod engine;
pub mod errors;
pub mod events;
pub mod normalize;
pub mod participants;
pub mod registry;
pub mod session;
pub mod sinks;
pub mod stats;
pub mod track;

pub use errors::RoomlinkError;
pub use events::{RoomEvent, RoomEventListener};
pub use registry::SessionRegistry;
