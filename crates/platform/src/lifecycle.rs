//! Driver lifecycle: a strictly linear state machine.

use anyhow::{Result, bail};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    WindowCreated,
    ContextReady,
    /// Shaders and mesh loaded.
    Initialized,
    Running,
    Closing,
    Terminated,
}

impl Phase {
    /// The single forward successor of this phase.
    pub fn next(self) -> Option<Phase> {
        use Phase::*;
        match self {
            Uninitialized => Some(WindowCreated),
            WindowCreated => Some(ContextReady),
            ContextReady => Some(Initialized),
            Initialized => Some(Running),
            Running => Some(Closing),
            Closing => Some(Terminated),
            Terminated => None,
        }
    }

    /// Forward steps, the per-frame `Running` self-loop, and the abort edge
    /// from any startup phase straight to `Closing`.
    pub fn can_transition_to(self, to: Phase) -> bool {
        if self.next() == Some(to) {
            return true;
        }
        match (self, to) {
            (Phase::Running, Phase::Running) => true,
            (
                Phase::Uninitialized
                | Phase::WindowCreated
                | Phase::ContextReady
                | Phase::Initialized,
                Phase::Closing,
            ) => true,
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct Lifecycle {
    phase: Phase,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: Phase::Uninitialized,
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn advance(&mut self, to: Phase) -> Result<()> {
        if !self.phase.can_transition_to(to) {
            bail!("illegal lifecycle transition {:?} -> {:?}", self.phase, to);
        }
        if self.phase != to {
            log::info!("Lifecycle: {:?} -> {:?}", self.phase, to);
        }
        self.phase = to;
        Ok(())
    }

    /// Finish in `Terminated`, passing through `Closing` if not there yet.
    pub fn shut_down(&mut self) -> Result<()> {
        if self.phase != Phase::Closing {
            self.advance(Phase::Closing)?;
        }
        self.advance(Phase::Terminated)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
