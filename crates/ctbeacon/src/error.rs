//! Error types for the ctbeacon library
//!
//! `HciError` covers the controller transport and the command/event protocol,
//! `BeaconError` covers device construction, identifier handling and the
//! radio state machine.

use crate::gap::RadioState;
use thiserror::Error;

/// Errors that can occur when working with HCI sockets
#[derive(Error, Debug)]
pub enum HciError {
    #[error("Failed to open HCI socket: {0}")]
    SocketError(#[from] std::io::Error),

    #[error("HCI device {0} is not up")]
    DeviceDown(u16),

    #[error("Failed to bind to HCI device: {0}")]
    BindError(std::io::Error),

    #[error("Failed to send HCI command: {0}")]
    SendError(std::io::Error),

    #[error("Failed to receive HCI event: {0}")]
    ReceiveError(std::io::Error),

    #[error("Failed to update HCI socket filter: {0}")]
    FilterError(std::io::Error),

    #[error("Timed out waiting for HCI command {ogf:#04x}/{ocf:#06x} to complete")]
    CommandTimeout { ogf: u8, ocf: u16 },

    #[error("HCI error during command {ogf:#04x}/{ocf:#06x}: status {status:#04x}")]
    ControllerStatus { ogf: u8, ocf: u16, status: u8 },

    #[error("Invalid parameter length: {0}")]
    InvalidParamLength(usize),

    #[error("Invalid HCI packet format")]
    InvalidPacketFormat,

    #[error("Malformed LE advertising report")]
    MalformedReport,
}

impl HciError {
    /// Returns true when the command or event could not be moved across the
    /// socket at all, as opposed to the controller rejecting a command.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::SocketError(_)
                | Self::BindError(_)
                | Self::SendError(_)
                | Self::ReceiveError(_)
                | Self::FilterError(_)
                | Self::CommandTimeout { .. }
        )
    }

    /// The controller status code, if this error carries one
    pub fn status(&self) -> Option<u8> {
        match self {
            Self::ControllerStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised by the beacon and the advertising codec
#[derive(Error, Debug)]
pub enum BeaconError {
    #[error("Bluetooth device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open Bluetooth device {name}: {source}")]
    DeviceOpenFailed {
        name: String,
        #[source]
        source: HciError,
    },

    #[error("Bluetooth device {0} is already owned by another beacon")]
    DeviceInUse(String),

    #[error("Identifier must be exactly 16 bytes, got {0}")]
    InvalidIdentifierLength(usize),

    #[error("Invalid identifier hex string: {0}")]
    InvalidIdentifierHex(#[from] hex::FromHexError),

    #[error("Advertising data of {0} bytes exceeds the 31 byte limit")]
    PayloadTooLong(usize),

    #[error("Radio is busy: currently {state}")]
    RadioBusy { state: RadioState },

    #[error(transparent)]
    Hci(#[from] HciError),
}

impl BeaconError {
    /// The controller status code, if the underlying command was rejected
    pub fn status(&self) -> Option<u8> {
        match self {
            Self::Hci(e) => e.status(),
            _ => None,
        }
    }
}
