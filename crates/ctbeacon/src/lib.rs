//! ctbeacon - An exposure notification BLE beacon over raw Linux HCI
//!
//! This library advertises a rotating 16-byte identifier in the exposure
//! notification advertising format and listens for the same packets from
//! other devices. It talks to the controller directly through an HCI socket:
//! commands go out through a [`CommandChannel`], advertising reports come back
//! through an [`EventReader`], and [`Beacon`] sequences both.
//!
//! Identifier rotation is left to the caller; the beacon treats identifiers
//! as opaque bytes.

pub mod beacon;
pub mod error;
pub mod gap;
pub mod hci;
pub mod scan;

// Re-export common types for convenience
pub use beacon::{Beacon, Observation};
pub use error::{BeaconError, HciError};
pub use gap::{decode, encode, AdvertisingPayload, BdAddr, Identifier, RadioState};
pub use hci::{CommandChannel, EventReader, HciCommand, HciEvent, HciSocket, HciTransport, LeAdvertisingReport, ReportOutcome};
pub use scan::ad_structures;
