//! HCI Socket implementation for Bluetooth communication
//!
//! This module provides a wrapper around the raw HCI socket interface,
//! allowing for communication with Bluetooth controllers.

use crate::error::HciError;
use crate::hci::transport::{HciFilter, HciTransport};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

// Bluetooth socket constants
const AF_BLUETOOTH: i32 = 31;
const BTPROTO_HCI: i32 = 1;
const HCI_CHANNEL_RAW: u16 = 0;
const SOL_HCI: i32 = 0;
const HCI_FILTER: i32 = 2;

// Device enumeration
const HCI_MAX_DEV: u16 = 16;
// _IOR('H', 211, int)
const HCIGETDEVINFO: u32 = 0x8004_48D3;
// Bit 0 of hci_dev_info.flags
const HCI_UP: u32 = 1 << 0;

/// Represents an HCI socket
#[derive(Debug)]
pub struct HciSocket {
    fd: OwnedFd,
}

// Define the sockaddr_hci structure
#[repr(C)]
struct SockaddrHci {
    hci_family: libc::sa_family_t,
    hci_dev: u16,
    hci_channel: u16,
}

// struct hci_dev_info, filled in by HCIGETDEVINFO
#[repr(C)]
#[allow(dead_code)]
struct HciDevInfo {
    dev_id: u16,
    name: [u8; 8],
    bdaddr: [u8; 6],
    flags: u32,
    dev_type: u8,
    features: [u8; 8],
    pkt_type: u32,
    link_policy: u32,
    link_mode: u32,
    acl_mtu: u16,
    acl_pkts: u16,
    sco_mtu: u16,
    sco_pkts: u16,
    stat: [u32; 10],
}

impl HciDevInfo {
    fn name(&self) -> &[u8] {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        &self.name[..end]
    }

    fn is_up(&self) -> bool {
        self.flags & HCI_UP != 0
    }

    /// `None` if this is some other device, `DeviceDown` if it is `name` but
    /// not up
    fn resolve(&self, name: &str) -> Option<Result<u16, HciError>> {
        if self.name() != name.as_bytes() {
            return None;
        }
        if !self.is_up() {
            return Some(Err(HciError::DeviceDown(self.dev_id)));
        }
        Some(Ok(self.dev_id))
    }
}

fn raw_socket() -> Result<OwnedFd, std::io::Error> {
    let fd = unsafe { libc::socket(AF_BLUETOOTH, libc::SOCK_RAW | libc::SOCK_CLOEXEC, BTPROTO_HCI) };

    if fd < 0 {
        return Err(std::io::Error::last_os_error());
    }

    // The descriptor is closed on drop from here on, whatever fails next
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

impl HciSocket {
    /// Resolve a device name such as `hci0` to its device ID
    ///
    /// Returns `Ok(None)` when no local controller carries that name, and
    /// `HciError::DeviceDown` when it exists but is powered off.
    pub fn device_id(name: &str) -> Result<Option<u16>, HciError> {
        let control = raw_socket().map_err(HciError::SocketError)?;

        for dev_id in 0..HCI_MAX_DEV {
            let mut info: HciDevInfo = unsafe { std::mem::zeroed() };
            info.dev_id = dev_id;

            let result = unsafe {
                libc::ioctl(
                    control.as_raw_fd(),
                    HCIGETDEVINFO as _,
                    &mut info as *mut HciDevInfo as *mut libc::c_void,
                )
            };

            if result < 0 {
                // ENODEV for unused indexes
                continue;
            }

            if let Some(resolved) = info.resolve(name) {
                return resolved.map(Some);
            }
        }

        Ok(None)
    }

    /// Opens a new HCI socket
    ///
    /// # Arguments
    ///
    /// * `dev_id` - The device ID to open (0 for the first device)
    ///
    /// # Returns
    ///
    /// A new `HciSocket` instance or an error if the socket could not be opened
    pub fn open(dev_id: u16) -> Result<Self, HciError> {
        let fd = raw_socket().map_err(HciError::SocketError)?;

        // Bind to the specified device
        let addr = SockaddrHci {
            hci_family: AF_BLUETOOTH as libc::sa_family_t,
            hci_dev: dev_id,
            hci_channel: HCI_CHANNEL_RAW,
        };

        let result = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const _ as *const libc::sockaddr,
                std::mem::size_of::<SockaddrHci>() as libc::socklen_t,
            )
        };

        if result < 0 {
            return Err(HciError::BindError(std::io::Error::last_os_error()));
        }

        Ok(HciSocket { fd })
    }

    #[cfg(test)]
    pub(crate) fn from_owned_fd(fd: OwnedFd) -> Self {
        HciSocket { fd }
    }
}

impl HciTransport for HciSocket {
    fn send(&mut self, packet: &[u8]) -> Result<(), HciError> {
        match unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                packet.as_ptr() as *const libc::c_void,
                packet.len(),
            )
        } {
            -1 => Err(HciError::SendError(std::io::Error::last_os_error())),
            _ => Ok(()),
        }
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool, HciError> {
        let mut fds = libc::pollfd {
            fd: self.fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // Rounded up so a sub-millisecond remainder still waits
        let timeout_ms = timeout
            .as_nanos()
            .div_ceil(1_000_000)
            .min(libc::c_int::MAX as u128) as libc::c_int;

        let result = unsafe { libc::poll(&mut fds, 1, timeout_ms) };

        if result < 0 {
            let err = std::io::Error::last_os_error();
            // A signal cut the wait short; report it as no data
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(HciError::ReceiveError(err));
        }

        Ok(result > 0)
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize, HciError> {
        let bytes_read = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
            )
        };

        if bytes_read < 0 {
            return Err(HciError::ReceiveError(std::io::Error::last_os_error()));
        }

        Ok(bytes_read as usize)
    }

    fn filter(&self) -> Result<HciFilter, HciError> {
        let mut filter = HciFilter::new();
        let mut len = std::mem::size_of::<HciFilter>() as libc::socklen_t;

        let result = unsafe {
            libc::getsockopt(
                self.fd.as_raw_fd(),
                SOL_HCI,
                HCI_FILTER,
                &mut filter as *mut HciFilter as *mut libc::c_void,
                &mut len,
            )
        };

        if result < 0 {
            return Err(HciError::FilterError(std::io::Error::last_os_error()));
        }

        Ok(filter)
    }

    fn set_filter(&mut self, filter: &HciFilter) -> Result<(), HciError> {
        let result = unsafe {
            libc::setsockopt(
                self.fd.as_raw_fd(),
                SOL_HCI,
                HCI_FILTER,
                filter as *const HciFilter as *const libc::c_void,
                std::mem::size_of::<HciFilter>() as libc::socklen_t,
            )
        };

        if result < 0 {
            return Err(HciError::FilterError(std::io::Error::last_os_error()));
        }

        Ok(())
    }
}

impl AsRawFd for HciSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
