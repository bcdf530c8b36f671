//! States for the dispatcher state machine.
//!
//! This modules is private and restricted to the [`dispatch`](crate::dispatch)
//! scope. The public interface of the state machine is provided by
//! [`dispatch`](crate::dispatch).
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use std::{fmt, process, thread};

use console::style;
use hexplay::HexViewBuilder;
use log::{debug, error, info, log_enabled, warn, Level::Debug};

use super::events::*;
use super::handler::RequestHandler;
use crate::{
    channel::{self, Message, MessageSink, MessageType, MSG_MAXLEN},
    error::{ChannelError, DispatchError},
    settings::Settings,
    transport::{self, TransportMode},
};

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Data shared by all the states: the settings and the request handler.
pub(crate) struct Shared {
    pub settings: Settings,
    pub handler: Box<dyn RequestHandler>,
}
impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("address", &self.settings.address)
            .field("mode", &self.settings.mode)
            .finish()
    }
}

/// Trait adding the ability for a state to be `run` after a transition into it.
pub(crate) trait Runnable {
    /// A state implements this method so it can be `run` after the state
    /// machine transitions into it.
    ///
    /// During this call, the state can do any work that needs to be done and
    /// when finished, requests a transition to a `new state` by returning the
    /// appropriate `event`. The `event` is then consumed to create the `new
    /// state` using the corresponding [`From`] trait implementation.
    fn run(&mut self, shared: &mut Shared) -> Event;
}

// Init State ==================================================================

/// The initial state: open the transport and select the channel matching its
/// mode. The selection is done once and never revisited.
///
///  * **[`ReadyEvent`] => [`ListenState`]** when the transport is open,
///  * **[`DoneEvent`] => [`DoneState`]** when it is not.
#[derive(Debug)]
pub(crate) struct InitState {}
impl Runnable for InitState {
    fn run(&mut self, shared: &mut Shared) -> Event {
        let settings = &shared.settings;
        info!(
            "=> Init [{}] starting message dispatcher on {} ({})",
            process::id(),
            settings.address,
            settings.mode
        );

        match transport::open(settings) {
            Ok(transport) => Event::Ready(ReadyEvent {
                link: Link {
                    channel: channel::select(settings.mode, transport),
                    retries: settings.retries,
                },
            }),
            Err(e) => {
                error!("{}", e);
                Event::Done(DoneEvent {
                    error: Some(DispatchError::Open(e)),
                })
            }
        }
    }
}

// Listen State ================================================================

/// Block until the channel delivers a message or fails.
///
///  * **[`ReceivedEvent`] => [`HandleState`]** with the message,
///  * **[`ListenEvent`] => [`ListenState`]** on a framing error. The parser
///    already resynchronized and the bytes read past the bad frame are kept,
///  * **[`ReceiveFailedEvent`] => [`ReconnectState`]** on an I/O failure.
#[derive(Debug)]
pub(crate) struct ListenState {
    /// Consumed and moved upon the next transition.
    pub link: Option<Link>,
}
impl Runnable for ListenState {
    fn run(&mut self, shared: &mut Shared) -> Event {
        if let Some(mut link) = self.link.take() {
            return match link.channel.receive() {
                Ok(message) => Event::Received(ReceivedEvent { link, message }),
                Err(ChannelError::Framing(ref e)) => {
                    warn!(
                        "[{}] Dropped frame on {}: {}",
                        process::id(),
                        shared.settings.address,
                        e
                    );
                    Event::Listen(ListenEvent { link })
                }
                Err(ref e) => {
                    error!(
                        "[{}] Message receiving error on {}, state={}: {}",
                        process::id(),
                        shared.settings.address,
                        link.channel.state(),
                        e
                    );
                    Event::ReceiveFailed(ReceiveFailedEvent { link })
                }
            };
        }

        // We should never reach here!
        unreachable!()
    }
}

// Handle State ================================================================

/// Hand the message to the request handler, then send the error reply if the
/// handler left the message typed as an error.
///
///  * **[`ListenEvent`] => [`ListenState`]** in every case.
#[derive(Debug)]
pub(crate) struct HandleState {
    pub link: Option<Link>,
    pub message: Message,
}
impl Runnable for HandleState {
    fn run(&mut self, shared: &mut Shared) -> Event {
        if let Some(mut link) = self.link.take() {
            let message = &mut self.message;
            debug!("=> Handle {:?}", message);
            if log_enabled!(Debug) {
                let view = HexViewBuilder::new(message.payload())
                    .address_offset(0)
                    .row_width(16)
                    .finish();
                debug!("\n{}", view);
            }

            if let Err(rejection) =
                shared
                    .handler
                    .handle(link.channel.sink(), message, &shared.settings.sysdir)
            {
                debug!("request dropped by the handler ({})", rejection.0);
                return Event::Listen(ListenEvent { link });
            }

            if message.kind() == MessageType::Err {
                send_error_reply(&mut link, message);
            }
            return Event::Listen(ListenEvent { link });
        }

        // We should never reach here!
        unreachable!()
    }
}

fn send_error_reply(link: &mut Link, message: &mut Message) {
    message.set_kind(MessageType::Err);
    if let Err(ref e) = message.set_len(MSG_MAXLEN) {
        error!("{}", e);
        return;
    }
    match link.channel.send(message) {
        Ok(sent) if !sent.is_complete() => warn!(
            "short write of the error reply: {} of {} bytes",
            sent.written, sent.expected
        ),
        Ok(_) => {}
        Err(ref e) => warn!("error reply not sent: {}", e),
    }
}

// Reconnect State =============================================================

/// Decide what to do after a receive I/O failure. Serial lines and sockets are
/// assumed to survive errors and are simply read again. Pipes are reopened
/// after a short backoff, as long as the reconnect budget lasts.
///
///  * **[`ListenEvent`] => [`ListenState`]** whatever the reconnect outcome,
///  * **[`DoneEvent`] => [`DoneState`]** when the budget is exhausted.
#[derive(Debug)]
pub(crate) struct ReconnectState {
    pub link: Option<Link>,
}
impl Runnable for ReconnectState {
    fn run(&mut self, shared: &mut Shared) -> Event {
        if let Some(mut link) = self.link.take() {
            let settings = &shared.settings;
            if settings.mode != TransportMode::Pipe {
                return Event::Listen(ListenEvent { link });
            }

            link.retries = link.retries.saturating_sub(1);
            if link.retries == 0 {
                let err = DispatchError::RetriesExhausted(settings.address.clone());
                error!("{}", err);
                return Event::Done(DoneEvent { error: Some(err) });
            }

            info!(
                "=> Reconnect {} ({} retries left)",
                settings.address, link.retries
            );
            thread::sleep(settings.backoff);
            if let Err(ref e) = link.channel.reconnect() {
                warn!("reconnect failed: {}", e);
            }
            return Event::Listen(ListenEvent { link });
        }

        // We should never reach here!
        unreachable!()
    }
}

// Done State ==================================================================

/// Reached when the dispatcher can't continue.
///
/// Like the other states it runs once to report, then triggers the
/// [`ExitEvent`] which stops the event loop.
#[derive(Debug)]
pub(crate) struct DoneState {
    /// The error that stopped the dispatcher, if any.
    pub error: Option<DispatchError>,
    /// When `true` instructs the event loop to exit.
    pub should_exit: bool,
}
impl Runnable for DoneState {
    fn run(&mut self, shared: &mut Shared) -> Event {
        info!(
            "=> Done with{}errors",
            if self.error.is_some() { " " } else { " no " }
        );
        if let Some(ref e) = self.error {
            println!(
                "{}",
                style(format!(
                    "[BL] 💥 Dispatcher on {} stopped: {}",
                    shared.settings.address, e
                ))
                .red()
            );
        }

        Event::Exit(ExitEvent {
            error: self.error.take(),
        })
    }
}
