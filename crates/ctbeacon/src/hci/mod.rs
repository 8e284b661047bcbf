//! Bluetooth HCI (Host Controller Interface) implementation
//!
//! This module provides functionality for interacting with HCI interfaces.

pub mod channel;
pub mod constants;
pub mod packet;
pub mod socket;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;
#[cfg(test)]
mod tests;

pub use channel::{CommandChannel, EventReader, ReportOutcome, DEFAULT_COMMAND_TIMEOUT};
pub use packet::{HciCommand, HciEvent, LeAdvertisingReport};
pub use socket::HciSocket;
pub use transport::{HciFilter, HciTransport};
