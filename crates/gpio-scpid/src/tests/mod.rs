//! Behavioural suites for the SCPI server.

mod scpi_behaviour;
mod socket_behaviour;
pub(crate) mod support;
