//! The single animation loop as an explicit state machine.
//!
//! The host drives time; each display refresh it asks for the armed handle with
//! [`FrameScheduler::begin_frame`], runs the frame and hands the handle back to
//! [`FrameScheduler::end_frame`], which re-arms it only if the loop is still live.

use std::cell::Cell;
use std::rc::Rc;

/// Token for one Running session of the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnimationHandle(u64);

impl AnimationHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Disposed,
}

/// Observes whether a scheduler has been disposed, without borrowing it.
#[derive(Clone, Debug)]
pub struct ShutdownToken {
    disposed: Rc<Cell<bool>>,
}

impl ShutdownToken {
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

#[derive(Debug)]
pub struct FrameScheduler {
    state: SchedulerState,
    session: Option<AnimationHandle>,
    pending: Option<AnimationHandle>,
    next_id: u64,
    frames: u64,
    shutdown: ShutdownToken,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
            session: None,
            pending: None,
            next_id: 1,
            frames: 0,
            shutdown: ShutdownToken {
                disposed: Rc::new(Cell::new(false)),
            },
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// Arms the loop. Returns the live handle; calling it again while Running
    /// returns the same handle. `None` once disposed.
    pub fn start(&mut self) -> Option<AnimationHandle> {
        match self.state {
            SchedulerState::Running => self.session,
            SchedulerState::Disposed => None,
            SchedulerState::Idle => {
                let handle = AnimationHandle(self.next_id);
                self.next_id += 1;
                self.state = SchedulerState::Running;
                self.session = Some(handle);
                self.pending = Some(handle);
                log::debug!("Animation loop started ({:?})", handle);
                Some(handle)
            }
        }
    }

    /// Cancels the pending callback. No-op unless Running.
    pub fn stop(&mut self) {
        if self.state != SchedulerState::Running {
            return;
        }
        self.state = SchedulerState::Idle;
        if let Some(handle) = self.session.take() {
            log::debug!("Animation loop stopped ({:?})", handle);
        }
        self.pending = None;
    }

    /// Stops for good. Every later call is a no-op.
    pub fn dispose(&mut self) {
        if self.state == SchedulerState::Disposed {
            return;
        }
        self.stop();
        self.state = SchedulerState::Disposed;
        self.shutdown.disposed.set(true);
        log::debug!("Animation loop disposed after {} frames", self.frames);
    }

    /// Takes the armed handle for this display frame, if any.
    pub fn begin_frame(&mut self) -> Option<AnimationHandle> {
        self.pending.take()
    }

    /// Re-arms `handle` for the next frame unless the loop was stopped (or
    /// restarted under a new handle) while the frame ran.
    pub fn end_frame(&mut self, handle: AnimationHandle) {
        self.frames += 1;
        if self.state == SchedulerState::Running && self.session == Some(handle) {
            self.pending = Some(handle);
        }
    }

    /// The handle that will fire on the next display frame.
    pub fn pending(&self) -> Option<AnimationHandle> {
        self.pending
    }

    /// Frames completed across all sessions.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}
