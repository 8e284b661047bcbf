//! Exposure notification advertising payload
//!
//! The beacon advertises three AD structures, 27 bytes in all:
//!
//! ```text
//! 02 01 1A                 Flags
//! 03 03 6F FD              Complete list of 16-bit service UUIDs: 0xFD6F
//! 13 16 6F FD <16 bytes>   Service data for 0xFD6F: the identifier
//! ```
//!
//! Other implementations of the beacon expect exactly this layout.

use crate::error::BeaconError;
use crate::gap::constants::*;
use crate::gap::types::AdFlags;
use crate::hci::constants::ADV_DATA_MAX_LEN;
use crate::scan::ad_structures;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// A rotating 16-byte proximity identifier
///
/// The contents are opaque here; they are only copied in and out of packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier([u8; IDENTIFIER_LEN]);

impl Identifier {
    pub fn new(bytes: [u8; IDENTIFIER_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTIFIER_LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Identifier {
    type Error = BeaconError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; IDENTIFIER_LEN] = bytes
            .try_into()
            .map_err(|_| BeaconError::InvalidIdentifierLength(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl FromStr for Identifier {
    type Err = BeaconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Identifier::try_from(bytes.as_slice())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Advertising data of at most 31 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingPayload {
    data: [u8; ADV_DATA_MAX_LEN],
    len: usize,
}

impl AdvertisingPayload {
    fn new() -> Self {
        Self {
            data: [0; ADV_DATA_MAX_LEN],
            len: 0,
        }
    }

    /// Append one AD structure; its length byte covers the type and payload
    fn push_structure(&mut self, ad_type: u8, payload: &[u8]) -> Result<(), BeaconError> {
        let structure_len = 2 + payload.len();
        if self.len + structure_len > ADV_DATA_MAX_LEN {
            return Err(BeaconError::PayloadTooLong(self.len + structure_len));
        }

        let out = &mut self.data[self.len..self.len + structure_len];
        out[0] = (1 + payload.len()) as u8;
        out[1] = ad_type;
        out[2..].copy_from_slice(payload);
        self.len += structure_len;
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for AdvertisingPayload {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Build the beacon's advertising data around `identifier`
///
/// `identifier` must be exactly 16 bytes; it is never truncated or padded.
pub fn encode(identifier: &[u8]) -> Result<AdvertisingPayload, BeaconError> {
    let identifier = Identifier::try_from(identifier)?;

    let mut uuid = [0u8; 2];
    LittleEndian::write_u16(&mut uuid, EXPOSURE_NOTIFICATION_SERVICE_UUID);

    let mut service_data = [0u8; 2 + IDENTIFIER_LEN];
    service_data[..2].copy_from_slice(&uuid);
    service_data[2..].copy_from_slice(identifier.as_bytes());

    let mut payload = AdvertisingPayload::new();
    payload.push_structure(ADV_TYPE_FLAGS, &[AdFlags::BEACON.bits()])?;
    payload.push_structure(ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE, &uuid)?;
    payload.push_structure(ADV_TYPE_SERVICE_DATA_16BIT, &service_data)?;

    debug_assert_eq!(payload.len(), BEACON_PAYLOAD_LEN);
    Ok(payload)
}

/// Extract the identifier from advertising data, if it carries one
///
/// Looks for 16-bit service data for the exposure notification UUID with at
/// least 16 bytes after the UUID. Foreign or malformed advertisements are
/// common on a shared channel and simply yield `None`.
pub fn decode(raw_report_bytes: &[u8]) -> Option<Identifier> {
    ad_structures(raw_report_bytes)
        .filter(|(ad_type, _)| *ad_type == ADV_TYPE_SERVICE_DATA_16BIT)
        .find_map(|(_, payload)| {
            let mut cursor = Cursor::new(payload);
            let uuid = cursor.read_u16::<LittleEndian>().ok()?;
            if uuid != EXPOSURE_NOTIFICATION_SERVICE_UUID {
                return None;
            }
            let identifier = payload.get(2..2 + IDENTIFIER_LEN)?;
            Identifier::try_from(identifier).ok()
        })
}
