//! SCPI command protocol served over TCP.
//!
//! Each connection gets a [`Session`] that frames the byte stream into lines
//! with a [`LineFramer`] and feeds them to its own [`Dispatcher`]. Only the
//! [`crate::pins::PinRegistry`] is shared between sessions.
//!
//! ## Protocol
//!
//! One command per line, terminated by `\n` or `\r\n`. Every non-blank line
//! gets exactly one reply line: `OK`, `ERROR`, or the query result.
//!
//! ```text
//! GPIO:SETUP 54,out
//! OK
//! GPIO:WRITE 54,ON
//! OK
//! GPIO:READ? 54
//! 1
//! GPIO:READ? 12
//! ERROR
//! SYST:ERR?
//! 3,"Invalid pin 12"
//! ```
//!
//! Failures are latched in a per-session register read (and cleared) with
//! `SYST:ERR?`; replies never carry the error code inline.

mod command;
mod dispatcher;
mod errors;
mod framer;
mod handlers;
mod session;

pub use command::{Command, CommandLine};
pub use dispatcher::Dispatcher;
pub use errors::{ErrorEntry, ScpiError};
pub use framer::{FramerError, LineFramer, MAX_LINE_BYTES};
pub use handlers::{IDENTITY, Reply};
pub use session::{ScpiConnectionHandler, Session, SessionEnd, banner};

const SCPI_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::scpi");
