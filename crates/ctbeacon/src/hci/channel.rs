//! Command and event capabilities over an HCI transport
//!
//! `CommandChannel` runs one command to completion. `EventReader` performs a
//! single bounded read of the event stream. Both borrow the transport, so a
//! command can never interleave with a read on the same controller.

use crate::error::HciError;
use crate::hci::constants::*;
use crate::hci::packet::{HciCommand, LeAdvertisingReport};
use crate::hci::transport::{HciFilter, HciTransport};
use std::time::{Duration, Instant};

/// How long a command may take before it is reported as a transport failure
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(1000);

/// Synchronous request/response channel to the controller
pub struct CommandChannel<'a, T: HciTransport + ?Sized> {
    transport: &'a mut T,
    timeout: Duration,
}

impl<'a, T: HciTransport + ?Sized> CommandChannel<'a, T> {
    pub fn new(transport: &'a mut T) -> Self {
        Self {
            transport,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `command` and block until the controller reports its status
    ///
    /// A non-zero status becomes `HciError::ControllerStatus`. Failing to
    /// write the command or to hear back within the timeout is a transport
    /// error. Nothing is retried.
    pub fn execute(&mut self, command: &HciCommand) -> Result<(), HciError> {
        let (ogf, ocf) = command.opcode_parts();

        let saved = self.transport.filter()?;
        self.transport
            .set_filter(&HciFilter::for_command(command.opcode()))?;

        let result = self.send_and_wait(command);
        let restored = self.transport.set_filter(&saved);

        let status = result?;
        restored?;

        if status != HCI_SUCCESS {
            log::warn!(
                "HCI command {:#04x}/{:#06x} failed with status {:#04x}",
                ogf,
                ocf,
                status
            );
            return Err(HciError::ControllerStatus { ogf, ocf, status });
        }

        log::debug!("HCI command {:#04x}/{:#06x} completed", ogf, ocf);
        Ok(())
    }

    fn send_and_wait(&mut self, command: &HciCommand) -> Result<u8, HciError> {
        let (ogf, ocf) = command.opcode_parts();
        let opcode = command.opcode();

        self.transport.send_command(command)?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(HciError::CommandTimeout { ogf, ocf });
            }

            // A wait cut short by a signal comes back empty before the deadline
            let event = match self.transport.read_event_timeout(remaining) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(HciError::InvalidPacketFormat) => continue,
                Err(e) => return Err(e),
            };

            if let Some(status) = event.command_result(opcode) {
                return Ok(status);
            }

            log::trace!(
                "Skipping event {:#04x} while waiting for {:#06x}",
                event.event_code,
                opcode
            );
        }
    }
}

/// Result of a single poll of the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The timeout elapsed without any event
    None,
    /// An LE Advertising Report event and the reports it carried
    Report(Vec<LeAdvertisingReport>),
    /// An event arrived but it was not a usable advertising report
    Unrelated,
}

/// Reads advertising reports from the controller's event stream
pub struct EventReader<'a, T: HciTransport + ?Sized> {
    transport: &'a mut T,
}

impl<'a, T: HciTransport + ?Sized> EventReader<'a, T> {
    pub fn new(transport: &'a mut T) -> Self {
        Self { transport }
    }

    /// Deliver only LE Meta events to this transport from now on
    ///
    /// Commands run through a `CommandChannel` put this filter back when they
    /// finish.
    pub fn restrict_to_le_meta(&mut self) -> Result<(), HciError> {
        self.transport.set_filter(&HciFilter::le_meta())
    }

    /// Wait up to `timeout` for one event and classify it
    ///
    /// At most one frame is read per call; an unrelated event is returned as
    /// such rather than waited past.
    pub fn poll_for_report(&mut self, timeout: Duration) -> Result<ReportOutcome, HciError> {
        let event = match self.transport.read_event_timeout(timeout) {
            Ok(Some(event)) => event,
            Ok(None) => return Ok(ReportOutcome::None),
            Err(HciError::InvalidPacketFormat) => return Ok(ReportOutcome::Unrelated),
            Err(e) => return Err(e),
        };

        if event.le_subevent() != Some(EVT_LE_ADVERTISING_REPORT) {
            return Ok(ReportOutcome::Unrelated);
        }

        match LeAdvertisingReport::parse_from_event(&event) {
            Ok(reports) => Ok(ReportOutcome::Report(reports)),
            Err(e) => {
                log::debug!("Dropping advertising report: {}", e);
                Ok(ReportOutcome::Unrelated)
            }
        }
    }
}
