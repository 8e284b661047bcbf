//! Scripted controller used by the unit tests

use crate::error::HciError;
use crate::hci::constants::*;
use crate::hci::transport::{HciFilter, HciTransport};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Answers every command with a Command Complete event and queues
/// whatever frames a test pushes in.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    pub sent: Vec<Vec<u8>>,
    pub filters: Vec<HciFilter>,
    filter: HciFilter,
    pending: VecDeque<Vec<u8>>,
    statuses: HashMap<u16, u8>,
    silent: bool,
    fail_send: bool,
    interruptions: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `opcode` with `status` instead of success
    pub fn with_status(mut self, ogf: u8, ocf: u16, status: u8) -> Self {
        self.statuses.insert(opcode(ogf, ocf), status);
        self
    }

    /// Never answer commands
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Fail every write
    pub fn failing_send(mut self) -> Self {
        self.fail_send = true;
        self
    }

    /// Wake the first `count` waits early with nothing to read
    pub fn interrupted(mut self, count: usize) -> Self {
        self.interruptions = count;
        self
    }

    /// Queue a raw frame (packet indicator included) for reading
    pub fn push_frame(&mut self, frame: Vec<u8>) {
        self.pending.push_back(frame);
    }

    /// Queue an HCI event with the given code and parameters
    pub fn push_event(&mut self, event_code: u8, parameters: &[u8]) {
        let mut frame = vec![HCI_EVENT_PKT, event_code, parameters.len() as u8];
        frame.extend_from_slice(parameters);
        self.push_frame(frame);
    }

    /// Opcodes of every command written so far, in order
    pub fn sent_opcodes(&self) -> Vec<u16> {
        self.sent
            .iter()
            .map(|packet| u16::from_le_bytes([packet[1], packet[2]]))
            .collect()
    }

    /// Parameters of the `index`th command written
    pub fn sent_parameters(&self, index: usize) -> &[u8] {
        &self.sent[index][4..]
    }

    pub fn current_filter(&self) -> HciFilter {
        self.filter
    }
}

impl HciTransport for MockTransport {
    fn send(&mut self, packet: &[u8]) -> Result<(), HciError> {
        if self.fail_send {
            return Err(HciError::SendError(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "controller gone",
            )));
        }

        self.sent.push(packet.to_vec());

        if !self.silent && packet.len() >= 3 && packet[0] == HCI_COMMAND_PKT {
            let op = u16::from_le_bytes([packet[1], packet[2]]);
            let status = self.statuses.get(&op).copied().unwrap_or(HCI_SUCCESS);
            let [lo, hi] = op.to_le_bytes();
            self.push_event(EVT_CMD_COMPLETE, &[1, lo, hi, status]);
        }

        Ok(())
    }

    fn wait_readable(&mut self, _timeout: Duration) -> Result<bool, HciError> {
        if self.interruptions > 0 {
            self.interruptions -= 1;
            return Ok(false);
        }
        Ok(!self.pending.is_empty())
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize, HciError> {
        let frame = self.pending.pop_front().ok_or_else(|| {
            HciError::ReceiveError(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "no frame queued",
            ))
        })?;
        let len = frame.len().min(buffer.len());
        buffer[..len].copy_from_slice(&frame[..len]);
        Ok(len)
    }

    fn filter(&self) -> Result<HciFilter, HciError> {
        Ok(self.filter)
    }

    fn set_filter(&mut self, filter: &HciFilter) -> Result<(), HciError> {
        self.filters.push(*filter);
        self.filter = *filter;
        Ok(())
    }
}
