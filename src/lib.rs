//! Bootlink is the host side of the bring-up of a custom board running a
//! small embedded kernel. It covers two jobs:
//!
//! * **Message dispatching.** The target exchanges small framed messages with
//!   the host over a serial line, a UDP socket or a pair of named pipes (the
//!   usual setup with an emulator). The dispatcher receives them one at a
//!   time, hands them to a request handler serving files from a system
//!   directory, and sends back an error reply when the handler can't serve
//!   them.
//! * **Boot ROM flashing.** Loading images into an i.MX SoC through the
//!   serial download protocol of its boot ROM, over USB HID, driven by a
//!   simple line oriented script.
//!
//! Like the rest of the `bootlink` tools, the dispatcher is implemented as a
//! state machine, with the following characteristics:
//!
//! * Can only be in one state at any time.
//! * Each state can have its own associated data if needed.
//! * It is possible to have some shared data between **all** states.
//! * Transitions between states are triggered via typed **events** and follow
//!   defined semantics.
//! * Transitioning from one state to another consumes the previous state and
//!   renders it unusable. Any transition back to that state would create a new
//!   state.
//! * Data can be transferred from one state to the next by attaching it to the
//!   transition event, like the open channel which moves from state to state
//!   and is never shared.
//!
//! State transitions are implemented with the `From` trait, converting
//! `event` types into `state` types. Only transitions for which the `From`
//! trait is implemented are authorized and any other transition would be
//! detected at compile-time as an error.

pub mod channel;
mod dispatch;
pub mod error;
pub mod script;
pub mod sdp;
mod session;
mod settings;
pub mod transport;

pub use dispatch::{Dispatcher, NullHandler, Rejection, RequestHandler};
pub use session::{load_script, ConsoleOperator, FlashSession, Operator};
pub use settings::{
    DataBits, FlashSettings, FlashSettingsBuilder, FlowControl, Parity, Settings,
    SettingsBuilder, StopBits, TransportMode,
};
