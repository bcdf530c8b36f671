//! The request handler seam of the dispatcher.

use std::path::Path;

use log::{info, log_enabled, trace, Level::Trace};

use crate::channel::{Message, MessageSink, MessageType};

/// A request the handler refused. The dispatcher drops the message and sends
/// nothing back.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Rejection(pub i32);

/// Services one message received from the target.
///
/// The handler may reply through `reply` as many times as it needs. It may
/// also rewrite `message` in place: a message re-typed as
/// [`MessageType::Err`] is answered by the dispatcher with a fixed error
/// reply of maximum length.
pub trait RequestHandler: Send {
    fn handle(
        &mut self,
        reply: &mut dyn MessageSink,
        message: &mut Message,
        sysdir: &Path,
    ) -> Result<(), Rejection>;
}

/// Handler that services nothing: every request is answered with the error
/// reply. Useful to check the link to a target before a real file server is
/// plugged in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHandler;
impl RequestHandler for NullHandler {
    fn handle(
        &mut self,
        _reply: &mut dyn MessageSink,
        message: &mut Message,
        sysdir: &Path,
    ) -> Result<(), Rejection> {
        info!(
            "{:?} request ({} bytes) for {} not serviced",
            message.kind(),
            message.len(),
            sysdir.display()
        );
        if log_enabled!(Trace) {
            trace!("{:?}", message);
        }
        message.set_kind(MessageType::Err);
        Ok(())
    }
}
