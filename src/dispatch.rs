//! `bootlink` message dispatcher.
//!
//! **Example** - Relaying messages between a QEMU guest and a request
//! handler:
//! ```no_run
//! use bootlink::{Dispatcher, NullHandler, SettingsBuilder, TransportMode};
//!
//! let settings = SettingsBuilder::new("/tmp/qemu")
//!     .mode(TransportMode::Pipe)
//!     .sysdir("../sys")
//!     .finalize();
//! let mut dispatcher = Dispatcher::new(settings, Box::new(NullHandler));
//! let status = dispatcher.run(); // only returns when the dispatcher gives up
//! std::process::exit(status);
//! ```

mod events;
mod handler;
mod state_machine;
mod states;

pub use handler::{NullHandler, Rejection, RequestHandler};
pub use state_machine::Dispatcher;
