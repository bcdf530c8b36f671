//! Message dispatcher state machine.
//!
//! The dispatcher receives one message at a time from the framed channel,
//! hands it to the request handler and relays the error reply when needed.
//! Everything is sequential: a message is fully received, handled and
//! answered before the next receive starts.
//!
//! The following state diagram summarizes the different states and
//! transitions the dispatcher goes through:
//!
//! ```text
//!                        START
//!                          |
//!                          v
//!                      .-------.   open
//!                      | Init  |---failed----------------.
//!                      '-------'                         |
//!                          | ready                       |
//!                          v                             v
//!     .------------>.----------.  i/o fail .-----------.  budget   .------.
//!     |      .----->|  Listen  |---------->| Reconnect |---------->| Done |
//!     |      |      '----------'<--.       '-----------' exhausted '------'
//!     |      |        |     |  bad |             |                    |
//!     |      |        |     '------'             |                    v
//!     |      |        | received  frame          |                   END
//!     |      |        v                          |
//!     |      |      .----------.                 |
//!     |      '------|  Handle  |                 |
//!     |     listen  '----------'                 |
//!     '------------------------------------------'
//!                         listen
//! ```

use std::path::Path;

use super::events::*;
use super::handler::RequestHandler;
use super::states::*;
use crate::{
    channel::{FramedChannel, ReceiveState},
    error::DispatchError,
    settings::Settings,
};

// =============================================================================
// Public Interface
// =============================================================================

/// The message dispatcher. Build it with [`Dispatcher::new`] and run it with
/// [`Dispatcher::run`].
///
/// **Example**
/// ```no_run
/// use bootlink::{Dispatcher, NullHandler, SettingsBuilder, TransportMode};
///
/// let settings = SettingsBuilder::new("/tmp/qemu")
///     .mode(TransportMode::Pipe)
///     .finalize();
/// let mut dispatcher = Dispatcher::new(settings, Box::new(NullHandler));
/// std::process::exit(dispatcher.run());
/// ```
pub struct Dispatcher {
    sm: Option<DispatcherStates>,
}
impl Dispatcher {
    /// A dispatcher that starts by opening the transport described in the
    /// settings.
    pub fn new(settings: Settings, handler: Box<dyn RequestHandler>) -> Self {
        Dispatcher {
            sm: Some(DispatcherStates::Init(DispatcherSM::new(settings, handler))),
        }
    }

    /// A dispatcher working on an already open channel. The transport mode in
    /// the settings still decides the reconnect policy.
    pub fn with_channel(
        settings: Settings,
        channel: Box<dyn FramedChannel>,
        handler: Box<dyn RequestHandler>,
    ) -> Self {
        let retries = settings.retries;
        let sm = DispatcherSM::new(settings, handler);
        Dispatcher {
            sm: Some(DispatcherStates::Listen(sm.transit(ListenState {
                link: Some(Link { channel, retries }),
            }))),
        }
    }

    /// The event loop runs until the `Done` state is reached and its
    /// `should_exit` flag is set. The returned status is **`0`** for a normal
    /// termination and **`1`** when the dispatcher stopped on an error; it can
    /// be used as the process exit code.
    pub fn run(&mut self) -> i32 {
        loop {
            self.step();
            if let Some(code) = self.exit_code() {
                return code;
            }
        }
    }

    /// Run the current state once and make the transition it asks for.
    pub fn step(&mut self) {
        if let Some(sm) = self.sm.take() {
            self.sm = Some(sm.step());
        }
    }

    /// The exit status, once the event loop is finished.
    pub fn exit_code(&self) -> Option<i32> {
        match &self.sm {
            Some(DispatcherStates::Done(sm)) if sm.state.should_exit => {
                Some(if sm.state.error.is_some() { 1 } else { 0 })
            }
            _ => None,
        }
    }

    /// The error the dispatcher stopped on, once it is done.
    pub fn error(&self) -> Option<&DispatchError> {
        match &self.sm {
            Some(DispatcherStates::Done(sm)) => sm.state.error.as_ref(),
            _ => None,
        }
    }

    /// Remaining pipe reconnect budget, while the channel is open.
    pub fn retries_left(&self) -> Option<u32> {
        self.link().map(|link| link.retries)
    }

    /// Receive state of the channel, while it is open.
    pub fn receive_state(&self) -> Option<ReceiveState> {
        self.link().map(|link| link.channel.state())
    }

    /// Served directory root.
    pub fn sysdir(&self) -> Option<&Path> {
        self.sm.as_ref().map(|sm| sm.shared().settings.sysdir.as_path())
    }

    fn link(&self) -> Option<&Link> {
        match self.sm.as_ref()? {
            DispatcherStates::Listen(sm) => sm.state.link.as_ref(),
            DispatcherStates::Handle(sm) => sm.state.link.as_ref(),
            DispatcherStates::Reconnect(sm) => sm.state.link.as_ref(),
            DispatcherStates::Init(_) | DispatcherStates::Done(_) => None,
        }
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// The raw state machine: the current state plus the data shared by all
/// states.
#[derive(Debug)]
struct DispatcherSM<S: Runnable> {
    shared: Shared,
    state: S,
}
impl<S: Runnable> DispatcherSM<S> {
    fn run(&mut self) -> Event {
        self.state.run(&mut self.shared)
    }

    /// Keep the shared data, move into `state`.
    fn transit<T: Runnable>(self, state: T) -> DispatcherSM<T> {
        DispatcherSM {
            shared: self.shared,
            state,
        }
    }
}

/// The state machine starts in the `InitState`.
impl DispatcherSM<InitState> {
    fn new(settings: Settings, handler: Box<dyn RequestHandler>) -> Self {
        DispatcherSM {
            shared: Shared { settings, handler },
            state: InitState {},
        }
    }
}

/// Wraps the state machine and its various states into a simple enum, which
/// can also be used for pattern matching during state transitions.
enum DispatcherStates {
    Init(DispatcherSM<InitState>),
    Listen(DispatcherSM<ListenState>),
    Handle(DispatcherSM<HandleState>),
    Reconnect(DispatcherSM<ReconnectState>),
    Done(DispatcherSM<DoneState>),
}
impl DispatcherStates {
    fn shared(&self) -> &Shared {
        match self {
            DispatcherStates::Init(sm) => &sm.shared,
            DispatcherStates::Listen(sm) => &sm.shared,
            DispatcherStates::Handle(sm) => &sm.shared,
            DispatcherStates::Reconnect(sm) => &sm.shared,
            DispatcherStates::Done(sm) => &sm.shared,
        }
    }

    /// The unit of work in the event loop. Runs the current state and makes
    /// the transition selected by the event it returns. State transitions
    /// from events are implemented using the rust `From`/`Into` pattern.
    fn step(self) -> Self {
        match self {
            DispatcherStates::Init(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Ready(ev) => DispatcherStates::Listen(sm.transit(ev.into())),
                    Event::Done(ev) => DispatcherStates::Done(sm.transit(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            DispatcherStates::Listen(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Received(ev) => DispatcherStates::Handle(sm.transit(ev.into())),
                    Event::ReceiveFailed(ev) => DispatcherStates::Reconnect(sm.transit(ev.into())),
                    Event::Listen(ev) => DispatcherStates::Listen(sm.transit(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            DispatcherStates::Handle(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Listen(ev) => DispatcherStates::Listen(sm.transit(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            DispatcherStates::Reconnect(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Listen(ev) => DispatcherStates::Listen(sm.transit(ev.into())),
                    Event::Done(ev) => DispatcherStates::Done(sm.transit(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
            DispatcherStates::Done(mut sm) => {
                let event = sm.run();
                match event {
                    Event::Exit(ev) => DispatcherStates::Done(sm.transit(ev.into())),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, sm),
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// State from Event transitions
// -----------------------------------------------------------------------------

impl From<ReadyEvent> for ListenState {
    fn from(event: ReadyEvent) -> ListenState {
        ListenState {
            link: Some(event.link),
        }
    }
}
impl From<ListenEvent> for ListenState {
    fn from(event: ListenEvent) -> ListenState {
        ListenState {
            link: Some(event.link),
        }
    }
}

impl From<ReceivedEvent> for HandleState {
    fn from(event: ReceivedEvent) -> HandleState {
        HandleState {
            link: Some(event.link),
            message: event.message,
        }
    }
}

impl From<ReceiveFailedEvent> for ReconnectState {
    fn from(event: ReceiveFailedEvent) -> ReconnectState {
        ReconnectState {
            link: Some(event.link),
        }
    }
}

impl From<DoneEvent> for DoneState {
    fn from(event: DoneEvent) -> DoneState {
        DoneState {
            error: event.error,
            should_exit: false,
        }
    }
}
impl From<ExitEvent> for DoneState {
    fn from(event: ExitEvent) -> DoneState {
        DoneState {
            error: event.error,
            should_exit: true,
        }
    }
}
