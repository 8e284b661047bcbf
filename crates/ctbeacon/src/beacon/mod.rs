//! Exposure notification beacon
//!
//! `Beacon` owns one controller transport and moves the radio between idle,
//! advertising and scanning. Advertising and scanning are mutually exclusive.

use crate::error::{BeaconError, HciError};
use crate::gap::{self, AddressType, AdvertisingParameters, BdAddr, Identifier, RadioState, ScanParameters};
use crate::hci::{
    CommandChannel, EventReader, HciCommand, HciSocket, HciTransport, ReportOutcome,
    DEFAULT_COMMAND_TIMEOUT,
};
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};


// Device IDs currently owned by a beacon in this process
static CLAIMED_DEVICES: Mutex<BTreeSet<u16>> = Mutex::new(BTreeSet::new());

/// Exclusive claim on a controller, released on drop
#[derive(Debug)]
struct DeviceClaim {
    dev_id: u16,
}

impl DeviceClaim {
    fn acquire(dev_id: u16) -> Option<Self> {
        let mut claimed = CLAIMED_DEVICES.lock().unwrap_or_else(|e| e.into_inner());
        claimed.insert(dev_id).then(|| DeviceClaim { dev_id })
    }
}

impl Drop for DeviceClaim {
    fn drop(&mut self) {
        let mut claimed = CLAIMED_DEVICES.lock().unwrap_or_else(|e| e.into_inner());
        claimed.remove(&self.dev_id);
    }
}

// A controller that exists but is down fails to open; any other lookup
// failure means the name could not be resolved
fn lookup_error(device_name: &str, e: HciError) -> BeaconError {
    match e {
        HciError::DeviceDown(_) => BeaconError::DeviceOpenFailed {
            name: device_name.to_string(),
            source: e,
        },
        e => {
            log::warn!("Could not enumerate HCI devices: {}", e);
            BeaconError::DeviceNotFound(device_name.to_string())
        }
    }
}

/// An identifier seen in an advertising report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub timestamp: SystemTime,
    pub address: BdAddr,
    pub address_type: AddressType,
    pub rssi: i8,
    pub identifier: Identifier,
}

/// Drives one BLE controller as an exposure notification beacon
#[derive(Debug)]
pub struct Beacon<T: HciTransport = HciSocket> {
    transport: T,
    state: RadioState,
    command_timeout: Duration,
    // Dropped after the transport
    _claim: Option<DeviceClaim>,
}

impl Beacon<HciSocket> {
    /// Open the controller called `device_name` (for example `hci0`)
    ///
    /// Only one beacon per controller may exist in a process at a time.
    pub fn open(device_name: &str) -> Result<Self, BeaconError> {
        let dev_id = match HciSocket::device_id(device_name) {
            Ok(Some(dev_id)) => dev_id,
            Ok(None) => return Err(BeaconError::DeviceNotFound(device_name.to_string())),
            Err(e) => return Err(lookup_error(device_name, e)),
        };

        let claim = DeviceClaim::acquire(dev_id)
            .ok_or_else(|| BeaconError::DeviceInUse(device_name.to_string()))?;

        let socket = HciSocket::open(dev_id).map_err(|source| BeaconError::DeviceOpenFailed {
            name: device_name.to_string(),
            source,
        })?;

        log::info!("Opened {} (device {})", device_name, dev_id);

        let mut beacon = Beacon::with_transport(socket);
        beacon._claim = Some(claim);
        Ok(beacon)
    }
}

impl<T: HciTransport> Beacon<T> {
    /// Build a beacon on an already opened transport
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            state: RadioState::Idle,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            _claim: None,
        }
    }

    /// How long each controller command may take
    pub fn set_command_timeout(&mut self, timeout: Duration) {
        self.command_timeout = timeout;
    }

    pub fn state(&self) -> RadioState {
        self.state
    }

    /// Borrow the controller's command channel
    pub fn command_channel(&mut self) -> CommandChannel<'_, T> {
        CommandChannel::new(&mut self.transport).with_timeout(self.command_timeout)
    }

    /// Borrow the controller's event stream
    pub fn event_reader(&mut self) -> EventReader<'_, T> {
        EventReader::new(&mut self.transport)
    }

    fn execute(&mut self, command: &HciCommand) -> Result<(), HciError> {
        self.command_channel().execute(command)
    }

    fn transition(&mut self, state: RadioState) {
        if self.state != state {
            log::info!("Radio {} -> {}", self.state, state);
            self.state = state;
        }
    }

    /// Start advertising `identifier`, or re-arm an active advertisement
    ///
    /// Sends parameters, enable and data, in that order. The first failure is
    /// returned and later commands are not sent; nothing is rolled back.
    pub fn start_advertising(&mut self, identifier: &[u8]) -> Result<(), BeaconError> {
        if self.state == RadioState::Scanning {
            return Err(BeaconError::RadioBusy { state: self.state });
        }

        let payload = gap::encode(identifier)?;
        let set_data = HciCommand::le_set_advertising_data(payload.as_bytes())?;

        self.execute(&AdvertisingParameters::BEACON.to_command())?;

        // Enabling while already enabled may also rotate the random address
        self.execute(&HciCommand::LeSetAdvertiseEnable { enable: true })?;
        self.transition(RadioState::Advertising);

        // Data goes in after enable; some controllers may want it before
        self.execute(&set_data)?;

        log::debug!("Advertising {}", hex::encode(payload.as_bytes()));
        Ok(())
    }

    /// Disable advertising. Safe to call when not advertising.
    pub fn stop_advertising(&mut self) -> Result<(), BeaconError> {
        if self.state == RadioState::Scanning {
            return Ok(());
        }

        self.execute(&HciCommand::LeSetAdvertiseEnable { enable: false })?;
        self.transition(RadioState::Idle);
        Ok(())
    }

    /// Start a passive scan delivering only LE Meta events to this socket
    pub fn start_listening(&mut self) -> Result<(), BeaconError> {
        if self.state == RadioState::Advertising {
            return Err(BeaconError::RadioBusy { state: self.state });
        }

        self.execute(&HciCommand::LeSetScanEnable {
            enable: false,
            filter_duplicates: false,
        })?;
        self.transition(RadioState::Idle);

        self.event_reader().restrict_to_le_meta()?;

        let params = ScanParameters::BEACON;
        self.execute(&params.to_command())?;
        self.execute(&params.enable_command())?;
        self.transition(RadioState::Scanning);
        Ok(())
    }

    /// Disable scanning. Safe to call when not scanning.
    pub fn stop_listening(&mut self) -> Result<(), BeaconError> {
        if self.state == RadioState::Advertising {
            return Ok(());
        }

        self.execute(&HciCommand::LeSetScanEnable {
            enable: false,
            filter_duplicates: false,
        })?;
        self.transition(RadioState::Idle);
        Ok(())
    }

    /// Poll the event stream once and decode any beacon identifiers
    ///
    /// Returns an empty list on timeout, on unrelated events and for reports
    /// that carry no identifier.
    pub fn poll_for_identifier(&mut self, timeout: Duration) -> Result<Vec<Observation>, BeaconError> {
        let reports = match self.event_reader().poll_for_report(timeout)? {
            ReportOutcome::Report(reports) => reports,
            ReportOutcome::None | ReportOutcome::Unrelated => return Ok(Vec::new()),
        };

        let timestamp = SystemTime::now();
        let observations = reports
            .into_iter()
            .filter_map(|report| {
                let identifier = gap::decode(&report.data)?;
                Some(Observation {
                    timestamp,
                    address: BdAddr::new(report.address),
                    address_type: AddressType::from(report.address_type),
                    rssi: report.rssi,
                    identifier,
                })
            })
            .collect();

        Ok(observations)
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    #[cfg(test)]
    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
