//! Streaming lifecycle: `Idle -> Configuring -> Streaming -> Idle`.

use core::fmt;

use crate::error::{LifecycleState, TransitionError};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamState {
    #[default]
    Idle,
    /// Staged controls are being flushed ahead of the streaming write.
    Configuring,
    Streaming,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StreamEvent {
    StartRequested,
    StartCompleted,
    StartAborted,
    Stopped,
}

impl StreamEvent {
    pub const fn target(self) -> StreamState {
        match self {
            StreamEvent::StartRequested => StreamState::Configuring,
            StreamEvent::StartCompleted => StreamState::Streaming,
            StreamEvent::StartAborted | StreamEvent::Stopped => StreamState::Idle,
        }
    }
}

impl StreamState {
    pub const fn is_streaming(self) -> bool {
        matches!(self, StreamState::Streaming)
    }

    /// Applies `event`, rejecting transitions the lifecycle does not allow.
    pub const fn transition(self, event: StreamEvent) -> Result<StreamState, TransitionError> {
        match (self, event) {
            (StreamState::Idle, StreamEvent::StartRequested) => Ok(StreamState::Configuring),
            (StreamState::Configuring, StreamEvent::StartCompleted) => Ok(StreamState::Streaming),
            (StreamState::Configuring, StreamEvent::StartAborted)
            | (StreamState::Streaming, StreamEvent::Stopped) => Ok(StreamState::Idle),
            (from, event) => Err(TransitionError::new(
                LifecycleState::Stream(from),
                LifecycleState::Stream(event.target()),
            )),
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StreamState::Idle => "idle",
            StreamState::Configuring => "configuring",
            StreamState::Streaming => "streaming",
        })
    }
}
