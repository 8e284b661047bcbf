use crate::gap::constants::*;
use crate::hci::HciCommand;
use bitflags::bitflags;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Public,
    Random,
    PublicIdentity,
    RandomIdentity,
}

impl From<u8> for AddressType {
    fn from(value: u8) -> Self {
        match value {
            PUBLIC_DEVICE_ADDRESS => AddressType::Public,
            RANDOM_DEVICE_ADDRESS => AddressType::Random,
            PUBLIC_IDENTITY_ADDRESS => AddressType::PublicIdentity,
            RANDOM_IDENTITY_ADDRESS => AddressType::RandomIdentity,
            _ => AddressType::Public,
        }
    }
}

impl From<AddressType> for u8 {
    fn from(value: AddressType) -> Self {
        match value {
            AddressType::Public => PUBLIC_DEVICE_ADDRESS,
            AddressType::Random => RANDOM_DEVICE_ADDRESS,
            AddressType::PublicIdentity => PUBLIC_IDENTITY_ADDRESS,
            AddressType::RandomIdentity => RANDOM_IDENTITY_ADDRESS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

/// What the radio is currently doing on behalf of the beacon
///
/// Advertising and scanning are never active at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RadioState {
    #[default]
    Idle,
    Advertising,
    Scanning,
}

impl fmt::Display for RadioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RadioState::Idle => "idle",
            RadioState::Advertising => "advertising",
            RadioState::Scanning => "scanning",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Value of the Flags AD structure
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AdFlags: u8 {
        const LE_LIMITED_DISCOVERABLE = 0x01;
        const LE_GENERAL_DISCOVERABLE = 0x02;
        const BR_EDR_NOT_SUPPORTED = 0x04;
        const SIMULTANEOUS_LE_BR_EDR_CONTROLLER = 0x08;
        const SIMULTANEOUS_LE_BR_EDR_HOST = 0x10;
    }
}

impl AdFlags {
    /// Flags carried by every exposure notification beacon (0x1A)
    pub const BEACON: AdFlags = AdFlags::LE_GENERAL_DISCOVERABLE
        .union(AdFlags::SIMULTANEOUS_LE_BR_EDR_CONTROLLER)
        .union(AdFlags::SIMULTANEOUS_LE_BR_EDR_HOST);
}

/// LE Set Advertising Parameters values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisingParameters {
    pub min_interval: u16,
    pub max_interval: u16,
    pub advertising_type: u8,
    pub own_address_type: AddressType,
    pub channel_map: u8,
}

impl AdvertisingParameters {
    /// Non-connectable, random address, all channels, every 200-270 ms
    pub const BEACON: AdvertisingParameters = AdvertisingParameters {
        min_interval: ms_to_ticks(ADV_INTERVAL_MIN_MS),
        max_interval: ms_to_ticks(ADV_INTERVAL_MAX_MS),
        advertising_type: ADV_NONCONN_IND,
        own_address_type: AddressType::Random,
        channel_map: ADV_CHANNEL_ALL,
    };

    pub fn to_command(&self) -> HciCommand {
        HciCommand::LeSetAdvertisingParameters {
            min_interval: self.min_interval,
            max_interval: self.max_interval,
            advertising_type: self.advertising_type,
            own_address_type: self.own_address_type.into(),
            peer_address_type: PUBLIC_DEVICE_ADDRESS,
            peer_address: [0; 6],
            channel_map: self.channel_map,
            filter_policy: LE_FILTER_ACCEPT_ALL,
        }
    }
}

/// LE Set Scan Parameters values plus the duplicate filter used on enable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParameters {
    pub scan_type: u8,
    pub interval: u16,
    pub window: u16,
    pub own_address_type: AddressType,
    pub filter_policy: u8,
    pub filter_duplicates: bool,
}

impl ScanParameters {
    /// Passive scan, 30 ms out of every 40 ms, duplicates filtered
    pub const BEACON: ScanParameters = ScanParameters {
        scan_type: LE_SCAN_PASSIVE,
        interval: LE_SCAN_INTERVAL,
        window: LE_SCAN_WINDOW,
        own_address_type: AddressType::Random,
        filter_policy: LE_FILTER_ACCEPT_ALL,
        filter_duplicates: true,
    };

    pub fn to_command(&self) -> HciCommand {
        HciCommand::LeSetScanParameters {
            scan_type: self.scan_type,
            scan_interval: self.interval,
            scan_window: self.window,
            own_address_type: self.own_address_type.into(),
            filter_policy: self.filter_policy,
        }
    }

    pub fn enable_command(&self) -> HciCommand {
        HciCommand::LeSetScanEnable {
            enable: true,
            filter_duplicates: self.filter_duplicates,
        }
    }
}
