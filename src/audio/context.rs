use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::mpsc::Sender;

use super::decode::AudioData;
use super::source::{PlaybackEvent, SignalSource, SourceId};
use crate::error::{Result, VizError};

/// Identifies one analysis tap wired onto a source's decode graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TapId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// Whether the host lets playback start without a user gesture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AutoplayPolicy {
    #[default]
    Allowed,
    RequiresGesture,
}

#[derive(Debug)]
struct ContextInner {
    state: ContextState,
    policy: AutoplayPolicy,
    gesture_granted: bool,
    next_id: u64,
    taps: HashMap<TapId, SourceId>,
    disconnects: u64,
}

/// The audio processing context behind one visualizer session.
///
/// Allocates source and tap identities and keeps the book of which taps are
/// wired up. Clones are handles onto the same context, so a host can keep
/// watching it while a visualizer owns the session.
#[derive(Clone, Debug)]
pub struct AudioContext {
    inner: Rc<RefCell<ContextInner>>,
}

impl AudioContext {
    pub fn new(policy: AutoplayPolicy) -> Self {
        let state = match policy {
            AutoplayPolicy::Allowed => ContextState::Running,
            AutoplayPolicy::RequiresGesture => ContextState::Suspended,
        };
        Self {
            inner: Rc::new(RefCell::new(ContextInner {
                state,
                policy,
                gesture_granted: false,
                next_id: 1,
                taps: HashMap::new(),
                disconnects: 0,
            })),
        }
    }

    pub fn state(&self) -> ContextState {
        self.inner.borrow().state
    }

    pub fn policy(&self) -> AutoplayPolicy {
        self.inner.borrow().policy
    }

    /// Next id for a live context, `Disposed` once closed.
    fn allocate(&self) -> Result<u64> {
        let mut inner = self.inner.borrow_mut();
        if inner.state == ContextState::Closed {
            return Err(VizError::Disposed);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        Ok(id)
    }

    pub fn create_source(
        &self,
        audio: AudioData,
        label: impl Into<String>,
        events: Sender<PlaybackEvent>,
    ) -> Result<SignalSource> {
        let id = SourceId(self.allocate()?);
        Ok(SignalSource::new(id, label.into(), audio, events))
    }

    /// Wires an analysis tap onto `source`.
    pub fn connect_analyser(&self, source: &SignalSource) -> Result<TapId> {
        let tap = TapId(self.allocate()?);
        self.inner.borrow_mut().taps.insert(tap, source.id());
        log::debug!("Connected analyser tap {:?} to source {:?}", tap, source.id());
        Ok(tap)
    }

    /// Unwires a tap. Returns false if it was already disconnected.
    pub fn disconnect(&self, tap: TapId) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.taps.remove(&tap) {
            Some(source) => {
                inner.disconnects += 1;
                log::debug!("Disconnected analyser tap {:?} from source {:?}", tap, source);
                true
            }
            None => false,
        }
    }

    pub fn tap_source(&self, tap: TapId) -> Option<SourceId> {
        self.inner.borrow().taps.get(&tap).copied()
    }

    pub fn active_taps(&self) -> usize {
        self.inner.borrow().taps.len()
    }

    pub fn disconnect_count(&self) -> u64 {
        self.inner.borrow().disconnects
    }

    pub fn grant_user_gesture(&self) {
        self.inner.borrow_mut().gesture_granted = true;
    }

    /// Makes sure the context can produce sound, resuming it if the policy allows.
    pub fn ensure_running(&self) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        match inner.state {
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(VizError::Disposed),
            ContextState::Suspended => {
                if inner.policy == AutoplayPolicy::RequiresGesture && !inner.gesture_granted {
                    return Err(VizError::PlaybackBlocked);
                }
                inner.state = ContextState::Running;
                log::info!("Audio context resumed");
                Ok(())
            }
        }
    }

    pub fn close(&self) {
        if self.state() == ContextState::Closed {
            return;
        }
        let leaked: Vec<TapId> = self.inner.borrow().taps.keys().copied().collect();
        for tap in leaked {
            log::warn!("Closing audio context with tap {:?} still connected", tap);
            self.disconnect(tap);
        }
        self.inner.borrow_mut().state = ContextState::Closed;
        log::info!("Audio context closed");
    }
}
