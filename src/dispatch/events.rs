//! Events for the dispatcher state machine.
//!
//! This modules is private and restricted to the [`dispatch`](crate::dispatch)
//! scope. The public interface of the state machine is provided by
//! [`dispatch`](crate::dispatch).
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use std::fmt;

use crate::{
    channel::{FramedChannel, Message},
    error::DispatchError,
};

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// The open channel and its reconnect budget. Moved from state to state with
/// the events; it is never duplicated.
pub(crate) struct Link {
    pub channel: Box<dyn FramedChannel>,
    /// Remaining pipe reconnect budget. Only decremented.
    pub retries: u32,
}
impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("channel", &self.channel.name())
            .field("state", &self.channel.state())
            .field("retries", &self.retries)
            .finish()
    }
}

// ReadyEvent ==================================================================

/// Event fired once the transport is open and the channel selected. Triggers
/// the transition from `Init` to `Listen`.
#[derive(Debug)]
pub(crate) struct ReadyEvent {
    pub link: Link,
}

// ReceivedEvent ===============================================================

/// Event fired when a complete message was received. Triggers the transition
/// to `Handle`.
#[derive(Debug)]
pub(crate) struct ReceivedEvent {
    pub link: Link,
    pub message: Message,
}

// ReceiveFailedEvent ==========================================================

/// Event fired when receiving failed on the transport.
/// Triggers the transition to `Reconnect`, which decides whether anything
/// needs to be done about it.
#[derive(Debug)]
pub(crate) struct ReceiveFailedEvent {
    pub link: Link,
}

// ListenEvent =================================================================

/// Event fired when a message has been dealt with, a bad frame dropped, or a
/// failure recovered from. Triggers the transition back to `Listen`.
#[derive(Debug)]
pub(crate) struct ListenEvent {
    pub link: Link,
}

// DoneEvent ===================================================================

/// Event fired when the dispatcher can't go on: the transport did not open or
/// the pipe reconnect budget is exhausted.
#[derive(Debug)]
pub(crate) struct DoneEvent {
    pub error: Option<DispatchError>,
}

// ExitEvent ===================================================================

/// The last event of the dispatcher. The event loop terminates and returns
/// the exit status.
#[derive(Debug)]
pub(crate) struct ExitEvent {
    pub error: Option<DispatchError>,
}

// Events enum ==================================================================

/// Events that can be triggered within the dispatcher state machine.
#[derive(Debug)]
pub(crate) enum Event {
    Ready(ReadyEvent),
    Received(ReceivedEvent),
    ReceiveFailed(ReceiveFailedEvent),
    Listen(ListenEvent),
    Done(DoneEvent),
    Exit(ExitEvent),
}
