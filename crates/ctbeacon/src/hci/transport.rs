//! Controller transport abstraction
//!
//! `HciTransport` is the seam between the command/event logic and the raw
//! socket. `HciSocket` is the production implementation.

use crate::error::HciError;
use crate::hci::constants::*;
use crate::hci::packet::{HciCommand, HciEvent};
use std::time::Duration;

const HCI_FLT_TYPE_BITS: u8 = 31;
const HCI_FLT_EVENT_BITS: u8 = 63;

/// Kernel-side packet filter of a raw HCI socket (`struct hci_filter`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

impl HciFilter {
    /// An empty filter; a socket with an empty filter receives nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit packets of the given HCI packet type
    pub fn set_ptype(&mut self, packet_type: u8) -> &mut Self {
        let bit = if packet_type == 0xFF {
            0
        } else {
            packet_type & HCI_FLT_TYPE_BITS
        };
        self.type_mask |= 1 << bit;
        self
    }

    /// Admit events with the given event code
    pub fn set_event(&mut self, event: u8) -> &mut Self {
        let bit = event & HCI_FLT_EVENT_BITS;
        self.event_mask[(bit >> 5) as usize] |= 1 << (bit & 31);
        self
    }

    /// Only admit Command Complete / Command Status events for this opcode
    pub fn set_opcode(&mut self, opcode: u16) -> &mut Self {
        self.opcode = opcode;
        self
    }

    pub fn admits_event(&self, event: u8) -> bool {
        let bit = event & HCI_FLT_EVENT_BITS;
        self.event_mask[(bit >> 5) as usize] & (1 << (bit & 31)) != 0
    }

    pub fn admits_ptype(&self, packet_type: u8) -> bool {
        self.type_mask & (1 << (packet_type & HCI_FLT_TYPE_BITS)) != 0
    }

    pub fn opcode(&self) -> u16 {
        self.opcode
    }

    /// Filter used while waiting for the completion of `opcode`
    pub fn for_command(opcode: u16) -> Self {
        let mut filter = Self::new();
        filter
            .set_ptype(HCI_EVENT_PKT)
            .set_event(EVT_CMD_COMPLETE)
            .set_event(EVT_CMD_STATUS)
            .set_opcode(opcode);
        filter
    }

    /// Filter restricting delivery to LE Meta events
    pub fn le_meta() -> Self {
        let mut filter = Self::new();
        filter.set_ptype(HCI_EVENT_PKT).set_event(EVT_LE_META_EVENT);
        filter
    }
}

/// A bidirectional packet channel to one Bluetooth controller
pub trait HciTransport {
    /// Write one complete HCI packet (including the packet indicator)
    fn send(&mut self, packet: &[u8]) -> Result<(), HciError>;

    /// Wait until a packet can be read or `timeout` elapses
    ///
    /// Returns `false` on timeout.
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool, HciError>;

    /// Read one packet into `buffer`, returning its length
    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize, HciError>;

    /// The currently installed packet filter
    fn filter(&self) -> Result<HciFilter, HciError>;

    /// Replace the packet filter
    fn set_filter(&mut self, filter: &HciFilter) -> Result<(), HciError>;

    /// Sends an HCI command to the controller
    fn send_command(&mut self, command: &HciCommand) -> Result<(), HciError> {
        let packet = command.to_packet();
        log::trace!("HCI command > {}", hex::encode(&packet));
        self.send(&packet)
    }

    /// Read an HCI event
    fn read_event(&mut self) -> Result<HciEvent, HciError> {
        let mut buffer = [0u8; HCI_MAX_FRAME_SIZE];
        let len = self.recv(&mut buffer)?;
        log::trace!("HCI frame < {}", hex::encode(&buffer[..len]));

        if len < 3 || buffer[0] != HCI_EVENT_PKT {
            return Err(HciError::InvalidPacketFormat);
        }

        HciEvent::parse(&buffer[1..len]).ok_or(HciError::InvalidPacketFormat)
    }

    /// Read an HCI event, waiting at most `timeout` for one to arrive
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    fn read_event_timeout(&mut self, timeout: Duration) -> Result<Option<HciEvent>, HciError> {
        if !self.wait_readable(timeout)? {
            return Ok(None);
        }
        self.read_event().map(Some)
    }
}
