//! Tail state machine
//!
//! Kept free of I/O so the race handling can be checked on its own. The
//! driver in [`super`] feeds it change notifications and pass completions and
//! does what the returned booleans say.

/// Where a tail is in its read cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailPhase {
    /// Waiting for the next change notification
    Idle,
    /// A `stream_from` pass is running
    Streaming,
    /// A pass is running and the index changed since it opened
    StreamingWithPendingChange,
}

/// Position and phase of one tail session
#[derive(Debug, Clone)]
pub struct TailState {
    phase: TailPhase,
    /// Logical index of the next entry to emit
    position: u64,
}

impl TailState {
    pub fn new(start: u64) -> Self {
        Self {
            phase: TailPhase::Idle,
            position: start,
        }
    }

    pub fn phase(&self) -> TailPhase {
        self.phase
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Record a change notification
    ///
    /// Returns `true` when the caller should start a pass. While a pass is
    /// already running the change only marks it dirty, so two passes never
    /// read the same region at once.
    pub fn on_change(&mut self) -> bool {
        match self.phase {
            TailPhase::Idle => {
                self.phase = TailPhase::Streaming;
                true
            }
            TailPhase::Streaming => {
                self.phase = TailPhase::StreamingWithPendingChange;
                false
            }
            TailPhase::StreamingWithPendingChange => false,
        }
    }

    /// Record one entry handed downstream
    pub fn on_emit(&mut self) {
        self.position += 1;
    }

    /// Record that a pass reached the end it saw on open
    ///
    /// Returns `true` when a change arrived during the pass and another pass
    /// must start right away from the current position.
    pub fn on_pass_complete(&mut self) -> bool {
        match self.phase {
            TailPhase::StreamingWithPendingChange => {
                self.phase = TailPhase::Streaming;
                true
            }
            TailPhase::Streaming | TailPhase::Idle => {
                self.phase = TailPhase::Idle;
                false
            }
        }
    }
}
