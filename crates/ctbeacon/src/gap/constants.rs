// Address types
pub const PUBLIC_DEVICE_ADDRESS: u8 = 0x00;
pub const RANDOM_DEVICE_ADDRESS: u8 = 0x01;
pub const PUBLIC_IDENTITY_ADDRESS: u8 = 0x02;
pub const RANDOM_IDENTITY_ADDRESS: u8 = 0x03;

// Advertising Data Types
pub const ADV_TYPE_FLAGS: u8 = 0x01;
pub const ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE: u8 = 0x03;
pub const ADV_TYPE_SERVICE_DATA_16BIT: u8 = 0x16;

// Exposure notification service
pub const EXPOSURE_NOTIFICATION_SERVICE_UUID: u16 = 0xFD6F;
pub const IDENTIFIER_LEN: usize = 16;
pub const BEACON_PAYLOAD_LEN: usize = 27;

// Advertising PDU types
pub const ADV_NONCONN_IND: u8 = 0x03;

// Advertising channels 37, 38 and 39
pub const ADV_CHANNEL_ALL: u8 = 0x07;

// Recommended advertising interval, ~200-270 ms
pub const ADV_INTERVAL_MIN_MS: u32 = 200;
pub const ADV_INTERVAL_MAX_MS: u32 = 270;

// LE Scan parameters
pub const LE_SCAN_PASSIVE: u8 = 0x00;
pub const LE_SCAN_INTERVAL: u16 = 0x0040; // 40 ms
pub const LE_SCAN_WINDOW: u16 = 0x0030; // 30 ms
pub const LE_FILTER_ACCEPT_ALL: u8 = 0x00;

/// Convert milliseconds to controller time units of 0.625 ms
pub const fn ms_to_ticks(ms: u32) -> u16 {
    (ms * 1000 / 625) as u16
}
