use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// A rendering target that can be attached to a video track.
///
/// The embedding UI implements this; the router guarantees at most one
/// active sink per track and balanced bind/unbind callbacks.
pub trait VideoSink: Send + Sync {
    fn on_bind(&self, track_sid: &str);
    fn on_unbind(&self, track_sid: &str);
}

#[derive(Default)]
struct RouterState {
    /// Sinks currently attached to a known track.
    active: HashMap<String, Arc<dyn VideoSink>>,
    /// Bindings waiting for their track to become known, plus bindings
    /// parked while their track is unsubscribed or playback-disabled.
    pending: HashMap<String, Arc<dyn VideoSink>>,
    /// Track sids the engine has made available for rendering.
    known: HashSet<String>,
}

/// Maps track identifiers to rendering sinks.
///
/// Shared across sessions (UI attachment is not room-scoped). Binding a
/// track that is not yet known is deferred until the track appears,
/// which covers the UI attaching its view before the engine finishes
/// subscribing.
#[derive(Clone, Default)]
pub struct TrackSinkRouter {
    state: Arc<Mutex<RouterState>>,
}

impl TrackSinkRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a sink to a track. An existing sink on the same track is
    /// unbound first, so the track never feeds two sinks.
    pub fn bind(&self, track_sid: &str, sink: Arc<dyn VideoSink>) {
        let (old, now_active) = {
            let mut state = self.state.lock().unwrap();
            if state.known.contains(track_sid) {
                let old = state.active.remove(track_sid);
                state.pending.remove(track_sid);
                state.active.insert(track_sid.to_string(), sink.clone());
                (old, true)
            } else {
                let old = state.pending.insert(track_sid.to_string(), sink.clone());
                (old, false)
            }
        };
        // Callbacks run outside the lock; a sink may re-enter the router.
        if let Some(old) = old {
            old.on_unbind(track_sid);
        }
        if now_active {
            sink.on_bind(track_sid);
        } else {
            tracing::debug!(track = track_sid, "sink bind deferred, track not yet known");
        }
    }

    /// Unbind whatever sink is attached to the track. No-op when the
    /// track is unbound or unknown.
    pub fn unbind(&self, track_sid: &str) {
        let removed = {
            let mut state = self.state.lock().unwrap();
            let active = state.active.remove(track_sid);
            let pending = state.pending.remove(track_sid);
            active.or(pending)
        };
        match removed {
            Some(sink) => sink.on_unbind(track_sid),
            None => tracing::debug!(track = track_sid, "unbind for unbound track, ignoring"),
        }
    }

    /// Unbind-then-bind, even when the sink is unchanged. Used to force
    /// a clean reattach after playback toggles.
    pub fn rebind(&self, track_sid: &str, sink: Arc<dyn VideoSink>) {
        self.bind(track_sid, sink);
    }

    /// Mark a track as available and apply any deferred binding.
    pub fn track_available(&self, track_sid: &str) {
        let bound = {
            let mut state = self.state.lock().unwrap();
            state.known.insert(track_sid.to_string());
            match state.pending.remove(track_sid) {
                Some(sink) => {
                    state.active.insert(track_sid.to_string(), sink.clone());
                    Some(sink)
                }
                None => None,
            }
        };
        if let Some(sink) = bound {
            tracing::debug!(track = track_sid, "applying deferred sink binding");
            sink.on_bind(track_sid);
        }
    }

    /// Mark a track as gone. An active binding is detached and parked
    /// as pending so a re-subscription reattaches it.
    pub fn track_lost(&self, track_sid: &str) {
        let parked = {
            let mut state = self.state.lock().unwrap();
            state.known.remove(track_sid);
            match state.active.remove(track_sid) {
                Some(sink) => {
                    state.pending.insert(track_sid.to_string(), sink.clone());
                    Some(sink)
                }
                None => None,
            }
        };
        if let Some(sink) = parked {
            sink.on_unbind(track_sid);
        }
    }

    /// Detach the sink without forgetting the binding (playback
    /// disabled for the track).
    pub fn suspend(&self, track_sid: &str) {
        let parked = {
            let mut state = self.state.lock().unwrap();
            match state.active.remove(track_sid) {
                Some(sink) => {
                    state.pending.insert(track_sid.to_string(), sink.clone());
                    Some(sink)
                }
                None => None,
            }
        };
        if let Some(sink) = parked {
            sink.on_unbind(track_sid);
        }
    }

    /// Reattach a suspended binding. An already-active binding is
    /// detached and reattached to guarantee a single feed.
    pub fn resume(&self, track_sid: &str) {
        let (detach, attach) = {
            let mut state = self.state.lock().unwrap();
            if !state.known.contains(track_sid) {
                (None, None)
            } else if let Some(sink) = state.pending.remove(track_sid) {
                state.active.insert(track_sid.to_string(), sink.clone());
                (None, Some(sink))
            } else if let Some(sink) = state.active.get(track_sid).cloned() {
                (Some(sink.clone()), Some(sink))
            } else {
                (None, None)
            }
        };
        if let Some(sink) = detach {
            sink.on_unbind(track_sid);
        }
        if let Some(sink) = attach {
            sink.on_bind(track_sid);
        }
    }

    pub fn is_bound(&self, track_sid: &str) -> bool {
        self.state.lock().unwrap().active.contains_key(track_sid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Records bind/unbind calls with a shared journal so ordering
    /// across sinks is observable.
    struct RecordingSink {
        label: &'static str,
        journal: Arc<StdMutex<Vec<String>>>,
    }

    impl RecordingSink {
        fn new(label: &'static str, journal: Arc<StdMutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self { label, journal })
        }
    }

    impl VideoSink for RecordingSink {
        fn on_bind(&self, track_sid: &str) {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:bind:{track_sid}", self.label));
        }

        fn on_unbind(&self, track_sid: &str) {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:unbind:{track_sid}", self.label));
        }
    }

    #[test]
    fn second_bind_unbinds_first_sink_before_new_bind() {
        let journal = Arc::new(StdMutex::new(Vec::new()));
        let router = TrackSinkRouter::new();
        router.track_available("t1");

        let a = RecordingSink::new("a", journal.clone());
        let b = RecordingSink::new("b", journal.clone());
        router.bind("t1", a);
        router.bind("t1", b);

        let journal = journal.lock().unwrap();
        assert_eq!(
            *journal,
            vec!["a:bind:t1", "a:unbind:t1", "b:bind:t1"]
        );
    }

    #[test]
    fn unbind_of_unbound_track_is_a_noop() {
        let journal = Arc::new(StdMutex::new(Vec::<String>::new()));
        let router = TrackSinkRouter::new();
        router.unbind("t1");
        assert!(journal.lock().unwrap().is_empty());
    }

    #[test]
    fn bind_to_unknown_track_is_deferred() {
        let journal = Arc::new(StdMutex::new(Vec::new()));
        let router = TrackSinkRouter::new();
        let a = RecordingSink::new("a", journal.clone());

        router.bind("t1", a);
        assert!(journal.lock().unwrap().is_empty());
        assert!(!router.is_bound("t1"));

        router.track_available("t1");
        assert!(router.is_bound("t1"));
        assert_eq!(*journal.lock().unwrap(), vec!["a:bind:t1"]);
    }

    #[test]
    fn lost_track_parks_binding_and_reattaches() {
        let journal = Arc::new(StdMutex::new(Vec::new()));
        let router = TrackSinkRouter::new();
        router.track_available("t1");
        let a = RecordingSink::new("a", journal.clone());
        router.bind("t1", a);

        router.track_lost("t1");
        assert!(!router.is_bound("t1"));

        router.track_available("t1");
        assert!(router.is_bound("t1"));
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["a:bind:t1", "a:unbind:t1", "a:bind:t1"]
        );
    }

    #[test]
    fn suspend_and_resume_cycle() {
        let journal = Arc::new(StdMutex::new(Vec::new()));
        let router = TrackSinkRouter::new();
        router.track_available("t1");
        let a = RecordingSink::new("a", journal.clone());
        router.bind("t1", a);

        router.suspend("t1");
        assert!(!router.is_bound("t1"));
        router.resume("t1");
        assert!(router.is_bound("t1"));

        assert_eq!(
            *journal.lock().unwrap(),
            vec!["a:bind:t1", "a:unbind:t1", "a:bind:t1"]
        );
    }

    #[test]
    fn resume_of_active_binding_forces_reattach() {
        let journal = Arc::new(StdMutex::new(Vec::new()));
        let router = TrackSinkRouter::new();
        router.track_available("t1");
        let a = RecordingSink::new("a", journal.clone());
        router.bind("t1", a);

        router.resume("t1");
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["a:bind:t1", "a:unbind:t1", "a:bind:t1"]
        );
    }

    #[test]
    fn at_most_one_sink_per_track_over_random_bind_storms() {
        use rand::Rng;
        let journal = Arc::new(StdMutex::new(Vec::new()));
        let router = TrackSinkRouter::new();
        router.track_available("t1");

        let sinks = [
            RecordingSink::new("a", journal.clone()),
            RecordingSink::new("b", journal.clone()),
            RecordingSink::new("c", journal.clone()),
        ];
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            if rng.gen_bool(0.7) {
                let sink = sinks[rng.gen_range(0..sinks.len())].clone();
                router.bind("t1", sink);
            } else {
                router.unbind("t1");
            }
        }

        // Replay the journal: the number of concurrently-bound sinks
        // must never exceed one.
        let mut bound = 0i32;
        for entry in journal.lock().unwrap().iter() {
            if entry.contains(":bind:") {
                bound += 1;
            } else {
                bound -= 1;
            }
            assert!(bound <= 1, "more than one sink bound at once");
            assert!(bound >= 0, "unbind without matching bind");
        }
    }
}
