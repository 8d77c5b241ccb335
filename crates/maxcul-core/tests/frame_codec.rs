//! Inbound line parsing through to decoded payloads
//!
//! Lines here are shaped like what a CUL stick prints for real devices,
//! including the trailing RSSI byte and mixed-case hex.

use maxcul_core::payload::{Payload, ThermostatMode};
use maxcul_core::protocol::frame::parse_frame;
use maxcul_core::protocol::{parse_line, CommandId, FrameError, InboundLine, PacketBuilder};
use maxcul_core::Address;
use pretty_assertions::assert_eq;

const BASE: Address = Address::new([0x12, 0x34, 0x56]);

fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

#[test]
fn test_group_broadcast_in_uppercase() {
    let packet = parse_frame("Z0D2D04420A1B2C000000012AD8F0", BASE).unwrap();

    // The RSSI byte is not part of the packet
    assert_eq!(packet.length, 0x0C);
    assert_eq!(usize::from(packet.length), packet.body_len());
    assert_eq!(packet.counter, 0x2D);
    assert!(packet.ack_requested());
    assert_eq!(packet.command_id(), Some(CommandId::WallThermostatControl));
    assert_eq!(packet.source, addr("0a1b2c"));
    assert!(packet.destination.is_broadcast());
    assert!(!packet.for_me);
    assert_eq!(packet.group, 1);
    assert_eq!(packet.payload, vec![0x2A, 0xD8]);
    // 0xF0 is a negative raw value
    assert_eq!(packet.rssi, Some(-82.0));

    match packet.decode_payload().unwrap() {
        Some(Payload::WallThermostatControl(control)) => {
            assert_eq!(control.desired_temperature, 21.0);
            assert_eq!(control.measured_temperature, 21.6);
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn test_wall_thermostat_state_for_this_controller() {
    let packet = parse_frame("Z101106700a1b2c1234560001042400d840", BASE).unwrap();
    assert!(packet.for_me);

    match packet.decode_payload().unwrap() {
        Some(Payload::WallThermostatState(state)) => {
            assert_eq!(state.mode, ThermostatMode::Manual);
            assert!(state.display_actual_temperature);
            assert_eq!(state.desired_temperature, 18.0);
            assert_eq!(state.measured_temperature, Some(21.6));
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn test_reserialized_frames_match_the_line() {
    let lines = [
        "Z0C010002160BD012345600011B",
        "Z0D2D04420A1B2C000000012AD8F0",
        "Z101106700a1b2c1234560001042400d840",
        "Z100504600a1b2c1234560019202c00d730",
        "Z17000400160BD0123456001001A04E455130363731393837",
    ];
    for line in lines {
        let packet = parse_frame(line, BASE).unwrap();
        let declared = u8::from_str_radix(&line[1..3], 16).unwrap();
        assert_eq!(packet.length + 1, declared, "{}", line);
        assert_eq!(usize::from(packet.length), packet.body_len(), "{}", line);

        // Everything after the length byte, without the trailing RSSI
        let body = line[3..line.len() - 2].to_ascii_lowercase();
        assert_eq!(packet.to_hex()[2..], body, "{}", line);
        assert_eq!(packet.to_hex()[..2], format!("{:02x}", packet.length));
    }
}

#[test]
fn test_declared_length_counts_rssi_byte() {
    // One character short of what the length byte promises
    let err = parse_frame("Z101106700a1b2c1234560001042400d84", BASE).unwrap_err();
    assert_eq!(
        err,
        FrameError::LengthMismatch {
            declared: 0x10,
            actual: 34
        }
    );

    // Declared length one too large
    let err = parse_frame("Z0D0100990a1b2c123456000040", BASE).unwrap_err();
    assert!(matches!(err, FrameError::LengthMismatch { declared: 0x0D, .. }));
}

#[test]
fn test_bad_hex_is_reported() {
    let err = parse_frame("Z0B01009g0a1b2c1234560040", BASE).unwrap_err();
    assert!(matches!(err, FrameError::InvalidHex(_)));
}

#[test]
fn test_unknown_command_has_no_payload_codec() {
    let packet = parse_frame("Z0C0100990a1b2c123456000040", BASE).unwrap();
    assert_eq!(packet.command, 0x99);
    assert_eq!(packet.command_id(), None);
    assert_eq!(packet.decode_payload(), Ok(None));
}

#[test]
fn test_outbound_frames_match_the_inbound_layout() {
    let outbound = PacketBuilder::new(CommandId::SetTemperature)
        .source(addr("0a1b2c"))
        .destination(BASE)
        .payload(vec![0x6B])
        .build(0x21);

    // The stick appends RSSI and recounts the length for received frames
    let received = format!("Z0C{}40", &outbound.to_hex()[2..]);
    match parse_line(&received, BASE).unwrap() {
        InboundLine::Frame(packet) => {
            assert_eq!(packet.counter, 0x21);
            assert_eq!(packet.source, outbound.source);
            assert_eq!(packet.payload, outbound.payload);
            assert!(packet.for_me);
        }
        other => panic!("unexpected line {:?}", other),
    }
}

#[test]
fn test_stick_status_lines() {
    assert_eq!(
        parse_line("V 1.67 CUL868\r\n", BASE).unwrap(),
        InboundLine::FirmwareVersion("V 1.67 CUL868".to_string())
    );
    assert_eq!(parse_line("LOVF", BASE).unwrap(), InboundLine::LimitOverflow);
    assert!(matches!(
        parse_line("  0   900 ", BASE).unwrap(),
        InboundLine::Credits(report) if report.credits == 0 && report.aux == 900
    ));
    assert_eq!(
        parse_line("12 34 56", BASE).unwrap(),
        InboundLine::Unknown("12 34 56".to_string())
    );
    assert_eq!(parse_line("\r\n", BASE), Err(FrameError::Empty));
}
