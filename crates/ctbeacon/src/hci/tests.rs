//! Unit tests for HCI packet parsing, serialization and the command channel

use super::channel::*;
use super::constants::*;
use super::mock::MockTransport;
use super::packet::*;
use super::socket::HciSocket;
use super::transport::*;
use crate::error::HciError;
use std::os::fd::{FromRawFd, OwnedFd};
use std::time::{Duration, Instant};

fn advertising_report_params() -> Vec<u8> {
    vec![
        EVT_LE_ADVERTISING_REPORT, // Subevent code
        1,                         // Num_Reports
        0x03,                      // Event_Type (ADV_NONCONN_IND)
        0x01,                      // Address_Type
        0x01,
        0x02,
        0x03,
        0x04,
        0x05,
        0x06, // Address
        3,    // Data_Length
        0x02,
        0x01,
        0x1A, // Data (Flags)
        0xC3, // RSSI (-61 dBm)
    ]
}

#[test]
fn test_hci_command_serialization() {
    let command = HciCommand::LeSetScanParameters {
        scan_type: 0x00,
        scan_interval: 0x0040,
        scan_window: 0x0030,
        own_address_type: 0x01,
        filter_policy: 0x00,
    };

    let packet = command.to_packet();

    assert_eq!(packet[0], HCI_COMMAND_PKT);

    // Opcode: LE Set Scan Parameters (0x000B)
    let opcode = u16::from_le_bytes([packet[1], packet[2]]);
    assert_eq!(opcode, 0x200B); // OGF_LE << 10 | OCF_LE_SET_SCAN_PARAMETERS

    // Param length: 7
    assert_eq!(packet[3], 7);

    // Parameters
    assert_eq!(packet[4], 0x00); // scan_type
    assert_eq!(u16::from_le_bytes([packet[5], packet[6]]), 0x0040); // scan_interval
    assert_eq!(u16::from_le_bytes([packet[7], packet[8]]), 0x0030); // scan_window
    assert_eq!(packet[9], 0x01); // own_address_type
    assert_eq!(packet[10], 0x00); // filter_policy

    let packet = HciCommand::LeSetScanEnable {
        enable: true,
        filter_duplicates: true,
    }
    .to_packet();
    assert_eq!(packet, vec![HCI_COMMAND_PKT, 0x0C, 0x20, 2, 0x01, 0x01]);

    let packet = HciCommand::LeSetAdvertiseEnable { enable: false }.to_packet();
    assert_eq!(packet, vec![HCI_COMMAND_PKT, 0x0A, 0x20, 1, 0x00]);
}

#[test]
fn test_advertising_parameters_serialization() {
    let packet = HciCommand::LeSetAdvertisingParameters {
        min_interval: 0x0140,
        max_interval: 0x01B0,
        advertising_type: 0x03,
        own_address_type: 0x01,
        peer_address_type: 0x00,
        peer_address: [0; 6],
        channel_map: 0x07,
        filter_policy: 0x00,
    }
    .to_packet();

    assert_eq!(u16::from_le_bytes([packet[1], packet[2]]), 0x2006);
    assert_eq!(packet[3], 15);
    assert_eq!(
        &packet[4..],
        &[0x40, 0x01, 0xB0, 0x01, 0x03, 0x01, 0x00, 0, 0, 0, 0, 0, 0, 0x07, 0x00]
    );
}

#[test]
fn test_advertising_data_is_padded() {
    let command = HciCommand::le_set_advertising_data(&[0x02, 0x01, 0x1A]).unwrap();
    let packet = command.to_packet();

    assert_eq!(u16::from_le_bytes([packet[1], packet[2]]), 0x2008);
    assert_eq!(packet[3] as usize, 1 + ADV_DATA_MAX_LEN);
    assert_eq!(packet[4], 3);
    assert_eq!(&packet[5..8], &[0x02, 0x01, 0x1A]);
    assert!(packet[8..].iter().all(|&b| b == 0));

    assert!(matches!(
        HciCommand::le_set_advertising_data(&[0; 32]),
        Err(HciError::InvalidParamLength(32))
    ));
}

#[test]
fn test_hci_event_parsing() {
    // Create a simple Command Complete event
    let data = [
        EVT_CMD_COMPLETE, // Event code
        4,                // Parameter length
        1,                // Num_HCI_Command_Packets
        0x0A,             // Command_Opcode (low byte)
        0x20,             // Command_Opcode (high byte)
        0x00,             // Status
    ];

    let event = HciEvent::parse(&data).unwrap();

    assert_eq!(event.event_code, EVT_CMD_COMPLETE);
    assert_eq!(event.parameter_total_length, 4);
    assert_eq!(event.parameters, vec![1, 0x0A, 0x20, 0x00]);

    assert_eq!(event.command_result(0x200A), Some(0x00));
    assert_eq!(event.command_result(0x200C), None);

    // Command Status carries the status first and the opcode last
    let event = HciEvent::parse(&[EVT_CMD_STATUS, 4, 0x0C, 1, 0x0C, 0x20]).unwrap();
    assert_eq!(event.command_result(0x200C), Some(HCI_COMMAND_DISALLOWED));
    assert_eq!(event.command_result(0x200B), None);

    let event = HciEvent::parse(&[EVT_LE_META_EVENT, 3, EVT_LE_CONN_COMPLETE, 0x00, 0x40]).unwrap();
    assert_eq!(event.le_subevent(), Some(EVT_LE_CONN_COMPLETE));
    assert_eq!(event.command_result(0x200A), None);

    // Invalid data tests
    assert!(HciEvent::parse(&[]).is_none()); // Empty data
    assert!(HciEvent::parse(&[EVT_CMD_COMPLETE, 10, 1, 2]).is_none()); // Too short for parameter length
}

#[test]
fn test_le_advertising_report_parsing() {
    let params = advertising_report_params();
    let event = HciEvent {
        event_code: EVT_LE_META_EVENT,
        parameter_total_length: params.len() as u8,
        parameters: params,
    };

    let reports = LeAdvertisingReport::parse_from_event(&event).unwrap();

    assert_eq!(reports.len(), 1);

    let report = &reports[0];
    assert_eq!(report.event_type, 0x03);
    assert_eq!(report.address_type, 0x01);
    assert_eq!(report.address, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
    assert_eq!(report.data_length, 3);
    assert_eq!(report.data, vec![0x02, 0x01, 0x1A]);
    assert_eq!(report.rssi, -61);

    // Not an LE Meta event
    let invalid_event = HciEvent {
        event_code: EVT_CMD_COMPLETE,
        parameter_total_length: 4,
        parameters: vec![1, 0x03, 0x0C, 0x00],
    };
    assert!(LeAdvertisingReport::parse_from_event(&invalid_event).is_err());

    // Not an Advertising Report subevent
    let invalid_event = HciEvent {
        event_code: EVT_LE_META_EVENT,
        parameter_total_length: 3,
        parameters: vec![EVT_LE_CONN_COMPLETE, 0x00, 0x00],
    };
    assert!(LeAdvertisingReport::parse_from_event(&invalid_event).is_err());

    // No reports
    let empty_event = HciEvent {
        event_code: EVT_LE_META_EVENT,
        parameter_total_length: 2,
        parameters: vec![EVT_LE_ADVERTISING_REPORT, 0],
    };
    let result = LeAdvertisingReport::parse_from_event(&empty_event);
    assert_eq!(result.unwrap().len(), 0);
}

#[test]
fn test_le_advertising_report_multiple_and_truncated() {
    let mut params = advertising_report_params();
    params[1] = 2;
    params.extend_from_slice(&[0x00, 0x00, 6, 5, 4, 3, 2, 1, 0, 0xB0]);

    let event = HciEvent {
        event_code: EVT_LE_META_EVENT,
        parameter_total_length: params.len() as u8,
        parameters: params.clone(),
    };
    let reports = LeAdvertisingReport::parse_from_event(&event).unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1].address, [6, 5, 4, 3, 2, 1]);
    assert!(reports[1].data.is_empty());
    assert_eq!(reports[1].rssi, -80);

    // Data length runs past the end of the event
    let mut truncated = advertising_report_params();
    truncated[10] = 30;
    let event = HciEvent {
        event_code: EVT_LE_META_EVENT,
        parameter_total_length: truncated.len() as u8,
        parameters: truncated,
    };
    assert!(matches!(
        LeAdvertisingReport::parse_from_event(&event),
        Err(HciError::MalformedReport)
    ));

    // Missing RSSI
    params.pop();
    let event = HciEvent {
        event_code: EVT_LE_META_EVENT,
        parameter_total_length: params.len() as u8,
        parameters: params,
    };
    assert!(LeAdvertisingReport::parse_from_event(&event).is_err());
}

#[test]
fn test_filter_bits() {
    let filter = HciFilter::for_command(0x200A);
    assert!(filter.admits_ptype(HCI_EVENT_PKT));
    assert!(!filter.admits_ptype(HCI_COMMAND_PKT));
    assert!(filter.admits_event(EVT_CMD_COMPLETE));
    assert!(filter.admits_event(EVT_CMD_STATUS));
    assert!(!filter.admits_event(EVT_LE_META_EVENT));
    assert_eq!(filter.opcode(), 0x200A);

    let filter = HciFilter::le_meta();
    assert!(filter.admits_event(EVT_LE_META_EVENT));
    assert!(!filter.admits_event(EVT_CMD_COMPLETE));
    assert_eq!(filter.opcode(), 0);

    // Same layout as the kernel's struct hci_filter
    assert_eq!(std::mem::size_of::<HciFilter>(), 16);
}

#[test]
fn test_command_channel_success_restores_filter() {
    let mut transport = MockTransport::new();
    let original = HciFilter::le_meta();
    transport.set_filter(&original).unwrap();

    CommandChannel::new(&mut transport)
        .execute(&HciCommand::LeSetAdvertiseEnable { enable: true })
        .unwrap();

    assert_eq!(transport.sent_opcodes(), vec![0x200A]);
    assert_eq!(transport.filters[1], HciFilter::for_command(0x200A));
    assert_eq!(transport.current_filter(), original);
}

#[test]
fn test_command_channel_reports_controller_status() {
    let mut transport =
        MockTransport::new().with_status(OGF_LE, OCF_LE_SET_ADVERTISE_ENABLE, HCI_COMMAND_DISALLOWED);

    let err = CommandChannel::new(&mut transport)
        .execute(&HciCommand::LeSetAdvertiseEnable { enable: true })
        .unwrap_err();

    match err {
        HciError::ControllerStatus { ogf, ocf, status } => {
            assert_eq!(ogf, OGF_LE);
            assert_eq!(ocf, OCF_LE_SET_ADVERTISE_ENABLE);
            assert_eq!(status, HCI_COMMAND_DISALLOWED);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!HciError::ControllerStatus { ogf: 0, ocf: 0, status: 1 }.is_transport());
}

#[test]
fn test_command_channel_skips_unrelated_events() {
    let mut transport = MockTransport::new();
    transport.push_event(EVT_LE_META_EVENT, &advertising_report_params());
    // Completion for some other command
    transport.push_event(EVT_CMD_COMPLETE, &[1, 0x03, 0x0C, 0x0C]);
    transport.push_frame(vec![0x02, 0x00]);

    CommandChannel::new(&mut transport)
        .execute(&HciCommand::LeSetScanEnable {
            enable: false,
            filter_duplicates: false,
        })
        .unwrap();
}

#[test]
fn test_command_channel_reads_command_status() {
    let mut transport = MockTransport::new().silent();
    // Status byte first, opcode high byte last
    transport.push_event(EVT_CMD_STATUS, &[HCI_COMMAND_DISALLOWED, 1, 0x0C, 0x20]);

    let err = CommandChannel::new(&mut transport)
        .execute(&HciCommand::LeSetScanEnable {
            enable: true,
            filter_duplicates: true,
        })
        .unwrap_err();

    assert_eq!(err.status(), Some(HCI_COMMAND_DISALLOWED));
}

#[test]
fn test_command_channel_waits_past_early_wakeup() {
    let mut transport = MockTransport::new().interrupted(3);

    CommandChannel::new(&mut transport)
        .with_timeout(Duration::from_millis(500))
        .execute(&HciCommand::LeSetAdvertiseEnable { enable: true })
        .unwrap();

    assert_eq!(transport.sent_opcodes(), vec![0x200A]);
}

#[test]
fn test_command_channel_transport_failures() {
    let mut transport = MockTransport::new().silent();
    let err = CommandChannel::new(&mut transport)
        .with_timeout(Duration::from_millis(10))
        .execute(&HciCommand::LeSetAdvertiseEnable { enable: false })
        .unwrap_err();
    assert!(matches!(
        err,
        HciError::CommandTimeout {
            ogf: OGF_LE,
            ocf: OCF_LE_SET_ADVERTISE_ENABLE
        }
    ));
    assert!(err.is_transport());

    let mut transport = MockTransport::new().failing_send();
    let err = CommandChannel::new(&mut transport)
        .execute(&HciCommand::LeSetAdvertiseEnable { enable: false })
        .unwrap_err();
    assert!(matches!(err, HciError::SendError(_)));
    assert!(err.is_transport());
    // The filter is put back even when the send fails
    assert_eq!(transport.current_filter(), HciFilter::new());
}

#[test]
fn test_event_reader_restricts_to_le_meta() {
    let mut transport = MockTransport::new();

    EventReader::new(&mut transport).restrict_to_le_meta().unwrap();

    assert_eq!(transport.filters, vec![HciFilter::le_meta()]);
    assert!(transport.current_filter().admits_event(EVT_LE_META_EVENT));
}

#[test]
fn test_event_reader_outcomes() {
    let mut transport = MockTransport::new();

    let outcome = EventReader::new(&mut transport)
        .poll_for_report(Duration::from_millis(10))
        .unwrap();
    assert_eq!(outcome, ReportOutcome::None);

    transport.push_event(EVT_LE_META_EVENT, &advertising_report_params());
    transport.push_event(EVT_LE_META_EVENT, &[EVT_LE_CONN_COMPLETE, 0x00]);
    transport.push_event(EVT_LE_META_EVENT, &[EVT_LE_ADVERTISING_REPORT, 1, 0x00]);

    let mut reader = EventReader::new(&mut transport);
    match reader.poll_for_report(Duration::from_millis(10)).unwrap() {
        ReportOutcome::Report(reports) => {
            assert_eq!(reports.len(), 1);
            assert_eq!(reports[0].data, vec![0x02, 0x01, 0x1A]);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    // One read per call, each classified on its own
    assert_eq!(
        reader.poll_for_report(Duration::from_millis(10)).unwrap(),
        ReportOutcome::Unrelated
    );
    assert_eq!(
        reader.poll_for_report(Duration::from_millis(10)).unwrap(),
        ReportOutcome::Unrelated
    );
    assert_eq!(
        reader.poll_for_report(Duration::from_millis(10)).unwrap(),
        ReportOutcome::None
    );
}

fn socket_pair() -> (HciSocket, OwnedFd) {
    let mut fds = [0; 2];
    let result = unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_SEQPACKET, 0, fds.as_mut_ptr()) };
    assert_eq!(result, 0);
    let local = unsafe { OwnedFd::from_raw_fd(fds[0]) };
    let peer = unsafe { OwnedFd::from_raw_fd(fds[1]) };
    (HciSocket::from_owned_fd(local), peer)
}

#[test]
fn test_socket_poll_is_bounded_by_timeout() {
    let (mut socket, _peer) = socket_pair();

    let start = Instant::now();
    let outcome = EventReader::new(&mut socket)
        .poll_for_report(Duration::from_millis(50))
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(outcome, ReportOutcome::None);
    assert!(elapsed < Duration::from_millis(50 + 500), "poll took {:?}", elapsed);
}

#[test]
fn test_socket_reads_one_frame() {
    use std::os::fd::AsRawFd;

    let (mut socket, peer) = socket_pair();

    let params = advertising_report_params();
    let mut frame = vec![HCI_EVENT_PKT, EVT_LE_META_EVENT, params.len() as u8];
    frame.extend_from_slice(&params);
    let written = unsafe {
        libc::write(
            peer.as_raw_fd(),
            frame.as_ptr() as *const libc::c_void,
            frame.len(),
        )
    };
    assert_eq!(written as usize, frame.len());

    match EventReader::new(&mut socket)
        .poll_for_report(Duration::from_millis(500))
        .unwrap()
    {
        ReportOutcome::Report(reports) => assert_eq!(reports[0].rssi, -61),
        other => panic!("unexpected outcome: {:?}", other),
    }
}
