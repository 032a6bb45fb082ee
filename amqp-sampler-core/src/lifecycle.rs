// amqp-sampler-core/src/lifecycle.rs
use tokio_util::sync::CancellationToken;

/// Per-instance lifecycle.
///
/// `Idle -> Active -> Ended`, or `Active -> Interrupted -> Ended` when an
/// interrupt lands while a sample is in flight. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Active,
    Interrupted,
    Ended,
}

#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Idle,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_ended(&self) -> bool {
        self.state == LifecycleState::Ended
    }

    pub fn activate(&mut self) {
        if self.state == LifecycleState::Idle {
            self.state = LifecycleState::Active;
        }
    }

    pub fn interrupt(&mut self) {
        if self.state != LifecycleState::Ended {
            self.state = LifecycleState::Interrupted;
        }
    }

    /// Moves to `Ended`. Returns true only for the call that performed the
    /// transition, which is the one that must run teardown.
    pub fn end(&mut self) -> bool {
        if self.state == LifecycleState::Ended {
            return false;
        }
        self.state = LifecycleState::Ended;
        true
    }
}

/// Cloneable handle used to interrupt a sampler from another task or thread.
///
/// Interrupting cancels a pending consume wait immediately. The sampler then
/// runs its end-of-test sequence and refuses further samples.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    token: CancellationToken,
}

impl InterruptHandle {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Always returns true: the interrupt has been registered.
    pub fn interrupt(&self) -> bool {
        self.token.cancel();
        true
    }

    pub fn is_interrupted(&self) -> bool {
        self.token.is_cancelled()
    }
}
