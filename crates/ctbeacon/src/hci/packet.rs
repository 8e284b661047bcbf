//! HCI packet structures and parsing
//!
//! This module contains structures and methods for handling HCI packets.

use crate::error::HciError;
use crate::hci::constants::*;
use byteorder::{ByteOrder, LittleEndian};

/// LE commands used by the beacon
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HciCommand {
    LeSetAdvertisingParameters {
        min_interval: u16,
        max_interval: u16,
        advertising_type: u8,
        own_address_type: u8,
        peer_address_type: u8,
        peer_address: [u8; 6],
        channel_map: u8,
        filter_policy: u8,
    },
    /// Advertising data, zero padded to the full 31 byte field
    LeSetAdvertisingData { length: u8, data: [u8; ADV_DATA_MAX_LEN] },
    LeSetAdvertiseEnable { enable: bool },
    LeSetScanParameters {
        scan_type: u8,
        scan_interval: u16,
        scan_window: u16,
        own_address_type: u8,
        filter_policy: u8,
    },
    LeSetScanEnable { enable: bool, filter_duplicates: bool },
}

impl HciCommand {
    /// Build an LE Set Advertising Data command
    ///
    /// Fails if `data` does not fit the 31 byte advertising data field.
    pub fn le_set_advertising_data(data: &[u8]) -> Result<Self, HciError> {
        if data.len() > ADV_DATA_MAX_LEN {
            return Err(HciError::InvalidParamLength(data.len()));
        }
        let mut padded = [0u8; ADV_DATA_MAX_LEN];
        padded[..data.len()].copy_from_slice(data);
        Ok(Self::LeSetAdvertisingData {
            length: data.len() as u8,
            data: padded,
        })
    }

    /// Get the OGF and OCF for this command
    pub fn opcode_parts(&self) -> (u8, u16) {
        match self {
            Self::LeSetAdvertisingParameters { .. } => (OGF_LE, OCF_LE_SET_ADVERTISING_PARAMETERS),
            Self::LeSetAdvertisingData { .. } => (OGF_LE, OCF_LE_SET_ADVERTISING_DATA),
            Self::LeSetAdvertiseEnable { .. } => (OGF_LE, OCF_LE_SET_ADVERTISE_ENABLE),
            Self::LeSetScanParameters { .. } => (OGF_LE, OCF_LE_SET_SCAN_PARAMETERS),
            Self::LeSetScanEnable { .. } => (OGF_LE, OCF_LE_SET_SCAN_ENABLE),
        }
    }

    /// The 16-bit opcode as it appears on the wire
    pub fn opcode(&self) -> u16 {
        let (ogf, ocf) = self.opcode_parts();
        opcode(ogf, ocf)
    }

    /// Convert the command to its raw parameter bytes
    fn parameters(&self) -> Vec<u8> {
        match self {
            Self::LeSetAdvertisingParameters {
                min_interval,
                max_interval,
                advertising_type,
                own_address_type,
                peer_address_type,
                peer_address,
                channel_map,
                filter_policy,
            } => {
                let mut params = Vec::with_capacity(15);
                params.extend_from_slice(&min_interval.to_le_bytes());
                params.extend_from_slice(&max_interval.to_le_bytes());
                params.push(*advertising_type);
                params.push(*own_address_type);
                params.push(*peer_address_type);
                params.extend_from_slice(peer_address);
                params.push(*channel_map);
                params.push(*filter_policy);
                params
            }

            Self::LeSetAdvertisingData { length, data } => {
                let mut params = Vec::with_capacity(1 + ADV_DATA_MAX_LEN);
                params.push(*length);
                params.extend_from_slice(data);
                params
            }

            Self::LeSetAdvertiseEnable { enable } => vec![*enable as u8],

            Self::LeSetScanParameters {
                scan_type,
                scan_interval,
                scan_window,
                own_address_type,
                filter_policy,
            } => {
                let mut params = Vec::with_capacity(7);
                params.push(*scan_type);
                params.extend_from_slice(&scan_interval.to_le_bytes());
                params.extend_from_slice(&scan_window.to_le_bytes());
                params.push(*own_address_type);
                params.push(*filter_policy);
                params
            }

            Self::LeSetScanEnable {
                enable,
                filter_duplicates,
            } => vec![*enable as u8, *filter_duplicates as u8],
        }
    }

    /// Convert the command to a raw HCI packet
    pub fn to_packet(&self) -> Vec<u8> {
        let params = self.parameters();

        let mut packet = Vec::with_capacity(4 + params.len());
        packet.push(HCI_COMMAND_PKT);
        packet.extend_from_slice(&self.opcode().to_le_bytes());
        packet.push(params.len() as u8);
        packet.extend_from_slice(&params);
        packet
    }
}

/// HCI Event packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HciEvent {
    pub event_code: u8,
    pub parameter_total_length: u8,
    pub parameters: Vec<u8>,
}

impl HciEvent {
    /// Parse an HCI event from raw bytes (without the packet indicator)
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 2 {
            return None;
        }

        let event_code = data[0];
        let parameter_total_length = data[1];

        let parameters = data.get(2..parameter_total_length as usize + 2)?.to_vec();

        Some(HciEvent {
            event_code,
            parameter_total_length,
            parameters,
        })
    }

    /// The LE Meta subevent code, if this is an LE Meta event
    pub fn le_subevent(&self) -> Option<u8> {
        if self.event_code != EVT_LE_META_EVENT {
            return None;
        }
        self.parameters.first().copied()
    }

    /// The completion status for `opcode`, if this event reports one
    ///
    /// Both Command Complete and Command Status events terminate a request.
    pub fn command_result(&self, opcode: u16) -> Option<u8> {
        match self.event_code {
            EVT_CMD_COMPLETE if self.parameters.len() >= 4 => {
                (LittleEndian::read_u16(&self.parameters[1..3]) == opcode).then(|| self.parameters[3])
            }
            EVT_CMD_STATUS if self.parameters.len() >= 4 => {
                (LittleEndian::read_u16(&self.parameters[2..4]) == opcode).then(|| self.parameters[0])
            }
            _ => None,
        }
    }
}

/// LE Advertising Report Event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeAdvertisingReport {
    pub event_type: u8,
    pub address_type: u8,
    pub address: [u8; 6],
    pub data_length: u8,
    pub data: Vec<u8>,
    pub rssi: i8,
}

impl LeAdvertisingReport {
    /// Parse every report carried by an LE Advertising Report meta event
    ///
    /// Reports are laid out one after another, each holding its own header,
    /// advertising data and RSSI.
    pub fn parse_from_event(event: &HciEvent) -> Result<Vec<Self>, HciError> {
        if event.le_subevent() != Some(EVT_LE_ADVERTISING_REPORT) {
            return Err(HciError::MalformedReport);
        }

        let params = &event.parameters;
        let num_reports = *params.get(1).ok_or(HciError::MalformedReport)?;

        let mut reports = Vec::with_capacity(num_reports as usize);
        let mut offset = 2;

        for _ in 0..num_reports {
            let header = params
                .get(offset..offset + 9)
                .ok_or(HciError::MalformedReport)?;

            let mut address = [0u8; 6];
            address.copy_from_slice(&header[2..8]);
            let data_length = header[8];

            let data_start = offset + 9;
            let data_end = data_start + data_length as usize;
            let data = params
                .get(data_start..data_end)
                .ok_or(HciError::MalformedReport)?
                .to_vec();
            let rssi = *params.get(data_end).ok_or(HciError::MalformedReport)? as i8;

            reports.push(LeAdvertisingReport {
                event_type: header[0],
                address_type: header[1],
                address,
                data_length,
                data,
                rssi,
            });

            offset = data_end + 1;
        }

        Ok(reports)
    }
}
