//! Command payload encoding, the blocking transaction engine and the
//! per-command acknowledgement decoders.
//!
//! A command payload is `opcode(u16, LE) || parameters`. The device answers
//! with an acknowledgement frame echoing the opcode; offset 7 of the frame
//! carries the success flag, offset 4 an echoed sub-length some commands use
//! to disambiguate multi-word acknowledgements. Beyond those two offsets the
//! acknowledgement payload is taken at face value.

use core::fmt;
use std::thread;
use std::time::Duration;

use arrayvec::ArrayVec;
use snafu::{ensure, Snafu};

use crate::frame;
use crate::session::Transport;
use crate::types::{BaudRate, DistanceResolution, Gate, Sensitivity};

/// Error type for command transactions.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[non_exhaustive]
pub enum CommError {
    /// The device sent nothing, or fewer bytes than the smallest valid
    /// acknowledgement carries.
    #[snafu(display("no or truncated response from the device"))]
    NoResponse,
    /// The acknowledgement's success flag was clear.
    #[snafu(display("the device rejected the command"))]
    DeviceRejected,
}

/// Command opcodes, transmitted low byte first.
mod opcode {
    pub const ENABLE_CONFIG: u16 = 0x00ff;
    pub const END_CONFIG: u16 = 0x00fe;
    pub const SET_MAX_GATE_AND_DURATION: u16 = 0x0060;
    pub const READ_PARAMETERS: u16 = 0x0061;
    pub const ENABLE_ENGINEERING: u16 = 0x0062;
    pub const END_ENGINEERING: u16 = 0x0063;
    pub const SET_GATE_SENSITIVITY: u16 = 0x0064;
    pub const READ_FIRMWARE_VERSION: u16 = 0x00a0;
    pub const SET_BAUD_RATE: u16 = 0x00a1;
    pub const FACTORY_RESET: u16 = 0x00a2;
    pub const REBOOT: u16 = 0x00a3;
    pub const SET_BLUETOOTH: u16 = 0x00a4;
    pub const GET_MAC_ADDRESS: u16 = 0x00a5;
    pub const BLUETOOTH_PERMISSION: u16 = 0x00a8;
    pub const SET_BLUETOOTH_PASSWORD: u16 = 0x00a9;
    pub const SET_RESOLUTION: u16 = 0x00aa;
    pub const QUERY_RESOLUTION: u16 = 0x00ab;
}

// Largest payload is opcode + three (u16 id, u32 value) tuples.
pub(crate) type Payload = ArrayVec<u8, 20>;

fn opcode_only(op: u16) -> Payload {
    let mut p = Payload::new();
    p.extend(op.to_le_bytes());
    p
}

fn with_word(op: u16, value: u16) -> Payload {
    let mut p = opcode_only(op);
    p.extend(value.to_le_bytes());
    p
}

/// Three (sub-parameter id, u32 value) tuples with ids 0, 1 and 2.
fn with_value_triple(op: u16, values: [u32; 3]) -> Payload {
    let mut p = opcode_only(op);
    for (id, value) in values.iter().enumerate() {
        p.extend((id as u16).to_le_bytes());
        p.extend(value.to_le_bytes());
    }
    p
}

fn with_key(op: u16, key: &[u8]) -> Payload {
    let mut p = opcode_only(op);
    p.try_extend_from_slice(key)
        .expect("BUG: Payload buffer too small.");
    p
}

pub(crate) fn enable_config() -> Payload {
    with_word(opcode::ENABLE_CONFIG, 0x0001)
}

pub(crate) fn end_config() -> Payload {
    opcode_only(opcode::END_CONFIG)
}

pub(crate) fn set_max_gate_and_duration(
    moving_gate: Gate,
    resting_gate: Gate,
    timeout_s: u16,
) -> Payload {
    with_value_triple(
        opcode::SET_MAX_GATE_AND_DURATION,
        [u32::from(*moving_gate), u32::from(*resting_gate), u32::from(timeout_s)],
    )
}

pub(crate) fn read_parameters() -> Payload {
    opcode_only(opcode::READ_PARAMETERS)
}

pub(crate) fn enable_engineering() -> Payload {
    opcode_only(opcode::ENABLE_ENGINEERING)
}

pub(crate) fn end_engineering() -> Payload {
    opcode_only(opcode::END_ENGINEERING)
}

pub(crate) fn set_gate_sensitivity(
    gate: Gate,
    motion: Sensitivity,
    still: Sensitivity,
) -> Payload {
    with_value_triple(
        opcode::SET_GATE_SENSITIVITY,
        [u32::from(*gate), u32::from(*motion), u32::from(*still)],
    )
}

pub(crate) fn read_firmware_version() -> Payload {
    opcode_only(opcode::READ_FIRMWARE_VERSION)
}

pub(crate) fn set_baud_rate(baud: BaudRate) -> Payload {
    with_word(opcode::SET_BAUD_RATE, baud.code())
}

pub(crate) fn factory_reset() -> Payload {
    opcode_only(opcode::FACTORY_RESET)
}

pub(crate) fn reboot() -> Payload {
    opcode_only(opcode::REBOOT)
}

pub(crate) fn set_bluetooth(enabled: bool) -> Payload {
    with_word(opcode::SET_BLUETOOTH, u16::from(enabled))
}

pub(crate) fn get_mac_address() -> Payload {
    with_word(opcode::GET_MAC_ADDRESS, 0x0001)
}

pub(crate) fn bluetooth_permission(key: &[u8; 8]) -> Payload {
    with_key(opcode::BLUETOOTH_PERMISSION, key)
}

pub(crate) fn set_bluetooth_password(password: &[u8; 6]) -> Payload {
    with_key(opcode::SET_BLUETOOTH_PASSWORD, password)
}

pub(crate) fn set_resolution(resolution: DistanceResolution) -> Payload {
    with_word(opcode::SET_RESOLUTION, resolution.code())
}

pub(crate) fn query_resolution() -> Payload {
    opcode_only(opcode::QUERY_RESOLUTION)
}

/// A raw acknowledgement frame, at least ten bytes long. Offsets 4 and 7
/// are always present; anything deeper is command-specific and accessed
/// through the length-checked [`byte`](Self::byte).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    bytes: Vec<u8>,
}

impl Ack {
    pub(crate) fn new(bytes: Vec<u8>) -> Ack {
        debug_assert!(frame::is_ack_frame_shape_valid(&bytes));
        Ack { bytes }
    }

    /// The raw frame, including header and terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the acknowledgement, returning the raw frame.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub(crate) fn status_ok(&self) -> bool {
        self.bytes[7] != 0
    }

    pub(crate) fn echoed_len(&self) -> u8 {
        self.bytes[4]
    }

    /// The byte at `offset`, or [`CommError::NoResponse`] if the device's
    /// reply was too short to carry it.
    pub(crate) fn byte(&self, offset: usize) -> Result<u8, CommError> {
        self.bytes.get(offset).copied().ok_or(CommError::NoResponse)
    }

    pub(crate) fn is_all_zero(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }

    pub(crate) fn check_status(&self) -> Result<(), CommError> {
        ensure!(self.status_ok(), DeviceRejectedSnafu);
        Ok(())
    }
}

/// Send one encoded command and collect the acknowledgement.
///
/// Writes the framed `payload`, sleeps for `timeout` to let the device
/// respond, then performs a single read. No response, or a response shorter
/// than the minimum acknowledgement, yields [`CommError::NoResponse`]; a
/// response split across reads is not reassembled (known boundary condition
/// of the blocking engine).
pub fn execute<T: Transport>(
    transport: &mut T,
    payload: &[u8],
    timeout: Duration,
) -> Result<Ack, CommError> {
    transport.write(&frame::encode_command(payload));
    thread::sleep(timeout);
    if transport.bytes_available() == 0 {
        return NoResponseSnafu.fail();
    }
    let response = transport.read();
    ensure!(frame::is_ack_frame_shape_valid(&response), NoResponseSnafu);
    Ok(Ack::new(response))
}

/// Success iff the flag at offset 7 is set. The common case.
pub(crate) fn decode_simple(ack: &Ack) -> Result<(), CommError> {
    ack.check_status()
}

/// The 0x0060 acknowledgement additionally echoes a sub-length of 4.
pub(crate) fn decode_gate_and_duration(ack: &Ack) -> Result<(), CommError> {
    ack.check_status()?;
    ensure!(ack.echoed_len() == 0x04, DeviceRejectedSnafu);
    Ok(())
}

/// Firmware version string from acknowledgement bytes 12..=17.
///
/// The rendering interleaves the bytes as `V{b13}.{b12}.{b17}{b16}{b15}{b14}`
/// with each byte written as unpadded hex digits, matching the vendor's
/// documented formatting.
pub(crate) fn decode_firmware_version(ack: &Ack) -> Result<String, CommError> {
    ack.check_status()?;
    let b = |offset| ack.byte(offset);
    Ok(format!(
        "V{:x}.{:x}.{:x}{:x}{:x}{:x}",
        b(13)?,
        b(12)?,
        b(17)?,
        b(16)?,
        b(15)?,
        b(14)?
    ))
}

/// A Bluetooth MAC address, from acknowledgement bytes 10..16.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

pub(crate) fn decode_mac_address(ack: &Ack) -> Result<MacAddress, CommError> {
    ack.check_status()?;
    let mut mac = [0u8; 6];
    for (i, byte) in mac.iter_mut().enumerate() {
        *byte = ack.byte(10 + i)?;
    }
    Ok(MacAddress(mac))
}

/// Permission grants are only trusted when the reply isn't the all-zero
/// sentinel some firmware revisions emit on a bad key.
pub(crate) fn decode_bluetooth_permission(ack: &Ack) -> Result<(), CommError> {
    ack.check_status()?;
    ensure!(!ack.is_all_zero(), DeviceRejectedSnafu);
    Ok(())
}

/// The success predicate differs by requested resolution: 0x0000 expects the
/// byte at offset 8 clear, 0x0001 expects it set. The asymmetry is carried
/// over from the vendor reference unverified.
pub(crate) fn decode_set_resolution(
    requested: DistanceResolution,
    ack: &Ack,
) -> Result<(), CommError> {
    ack.check_status()?;
    let flag = ack.byte(8)?;
    let ok = match requested {
        DistanceResolution::Coarse => flag == 0,
        DistanceResolution::Fine => flag != 0,
    };
    ensure!(ok, DeviceRejectedSnafu);
    Ok(())
}

/// Tri-state resolution query: the echoed sub-length must be 6, then the
/// byte at offset 10 selects fine (nonzero) or coarse (zero).
pub(crate) fn decode_query_resolution(ack: &Ack) -> Result<DistanceResolution, CommError> {
    ack.check_status()?;
    ensure!(ack.echoed_len() == 6, DeviceRejectedSnafu);
    if ack.byte(10)? != 0 {
        Ok(DistanceResolution::Fine)
    } else {
        Ok(DistanceResolution::Coarse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{gate, sensitivity};

    fn ack_with(bytes: &[(usize, u8)]) -> Ack {
        let mut raw = vec![0u8; 18];
        for (offset, value) in bytes {
            raw[*offset] = *value;
        }
        Ack::new(raw)
    }

    #[test]
    fn test_enable_config_payload() {
        assert_eq!(enable_config().as_slice(), [0xff, 0x00, 0x01, 0x00]);
        assert_eq!(end_config().as_slice(), [0xfe, 0x00]);
    }

    #[test]
    fn test_gate_and_duration_payload() {
        let p = set_max_gate_and_duration(gate(8), gate(8), 5);
        assert_eq!(
            p.as_slice(),
            [
                0x60, 0x00, // opcode
                0x00, 0x00, 0x08, 0x00, 0x00, 0x00, // moving gate
                0x01, 0x00, 0x08, 0x00, 0x00, 0x00, // resting gate
                0x02, 0x00, 0x05, 0x00, 0x00, 0x00, // timeout seconds
            ]
        );
    }

    #[test]
    fn test_gate_sensitivity_payload() {
        let p = set_gate_sensitivity(gate(3), sensitivity(40), sensitivity(40));
        assert_eq!(
            p.as_slice(),
            [
                0x64, 0x00, //
                0x00, 0x00, 0x03, 0x00, 0x00, 0x00, //
                0x01, 0x00, 0x28, 0x00, 0x00, 0x00, //
                0x02, 0x00, 0x28, 0x00, 0x00, 0x00,
            ]
        );
    }

    #[test]
    fn test_word_payloads() {
        assert_eq!(set_baud_rate(BaudRate::B256000).as_slice(), [0xa1, 0x00, 0x07, 0x00]);
        assert_eq!(set_bluetooth(true).as_slice(), [0xa4, 0x00, 0x01, 0x00]);
        assert_eq!(set_bluetooth(false).as_slice(), [0xa4, 0x00, 0x00, 0x00]);
        assert_eq!(get_mac_address().as_slice(), [0xa5, 0x00, 0x01, 0x00]);
        assert_eq!(
            set_resolution(DistanceResolution::Fine).as_slice(),
            [0xaa, 0x00, 0x01, 0x00]
        );
    }

    #[test]
    fn test_key_payloads() {
        assert_eq!(
            bluetooth_permission(b"HiLinkHi").as_slice(),
            [0xa8, 0x00, b'H', b'i', b'L', b'i', b'n', b'k', b'H', b'i']
        );
        assert_eq!(
            set_bluetooth_password(b"HiLink").as_slice(),
            [0xa9, 0x00, b'H', b'i', b'L', b'i', b'n', b'k']
        );
    }

    struct CannedTransport {
        response: Vec<u8>,
    }

    impl Transport for CannedTransport {
        fn write(&mut self, _data: &[u8]) {}
        fn bytes_available(&self) -> usize {
            self.response.len()
        }
        fn read(&mut self) -> Vec<u8> {
            assert!(!self.response.is_empty(), "read with nothing available");
            std::mem::take(&mut self.response)
        }
    }

    #[test]
    fn test_execute_without_response() {
        let mut silent = CannedTransport { response: Vec::new() };
        let err = execute(&mut silent, &enable_config(), Duration::from_millis(1)).unwrap_err();
        assert_eq!(err, CommError::NoResponse);
    }

    #[test]
    fn test_execute_short_response() {
        let mut transport = CannedTransport {
            response: vec![0xfd, 0xfc, 0xfb, 0xfa, 0, 0, 0xff, 1, 0],
        };
        let err = execute(&mut transport, &enable_config(), Duration::from_millis(1)).unwrap_err();
        assert_eq!(err, CommError::NoResponse);
    }

    #[test]
    fn test_execute_returns_raw_ack() {
        let response = ack_with(&[(7, 1)]).into_bytes();
        let mut transport = CannedTransport { response: response.clone() };
        let ack = execute(&mut transport, &end_config(), Duration::from_millis(1)).unwrap();
        assert_eq!(ack.as_bytes(), response.as_slice());
    }

    #[test]
    fn test_simple_decode() {
        assert_eq!(decode_simple(&ack_with(&[(7, 1)])), Ok(()));
        assert_eq!(decode_simple(&ack_with(&[])), Err(CommError::DeviceRejected));
    }

    #[test]
    fn test_gate_and_duration_decode() {
        assert_eq!(decode_gate_and_duration(&ack_with(&[(7, 1), (4, 4)])), Ok(()));
        assert_eq!(
            decode_gate_and_duration(&ack_with(&[(7, 1), (4, 6)])),
            Err(CommError::DeviceRejected)
        );
        assert_eq!(
            decode_gate_and_duration(&ack_with(&[(4, 4)])),
            Err(CommError::DeviceRejected)
        );
    }

    #[test]
    fn test_firmware_version_decode() {
        let ack = ack_with(&[
            (7, 1),
            (12, 0x07),
            (13, 0x01),
            (14, 0x16),
            (15, 0x24),
            (16, 0x06),
            (17, 0x22),
        ]);
        assert_eq!(decode_firmware_version(&ack).unwrap(), "V1.7.2262416");
    }

    #[test]
    fn test_firmware_version_needs_full_ack() {
        // Success flag set but the reply stops before the version bytes.
        let ack = Ack::new(vec![0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(decode_firmware_version(&ack), Err(CommError::NoResponse));
    }

    #[test]
    fn test_mac_decode() {
        let ack = ack_with(&[
            (7, 1),
            (10, 0x8f),
            (11, 0x27),
            (12, 0x2e),
            (13, 0xb8),
            (14, 0x0f),
            (15, 0x65),
        ]);
        let mac = decode_mac_address(&ack).unwrap();
        assert_eq!(mac, MacAddress([0x8f, 0x27, 0x2e, 0xb8, 0x0f, 0x65]));
        assert_eq!(mac.to_string(), "8f:27:2e:b8:0f:65");
    }

    #[test]
    fn test_bluetooth_permission_decode() {
        assert_eq!(decode_bluetooth_permission(&ack_with(&[(7, 1)])), Ok(()));
        // All-zero sentinel never passes, the status flag check catches it.
        assert_eq!(
            decode_bluetooth_permission(&ack_with(&[])),
            Err(CommError::DeviceRejected)
        );
    }

    #[test]
    fn test_set_resolution_decode() {
        let flag_clear = ack_with(&[(7, 1)]);
        let flag_set = ack_with(&[(7, 1), (8, 1)]);
        assert_eq!(decode_set_resolution(DistanceResolution::Coarse, &flag_clear), Ok(()));
        assert_eq!(
            decode_set_resolution(DistanceResolution::Coarse, &flag_set),
            Err(CommError::DeviceRejected)
        );
        assert_eq!(decode_set_resolution(DistanceResolution::Fine, &flag_set), Ok(()));
        assert_eq!(
            decode_set_resolution(DistanceResolution::Fine, &flag_clear),
            Err(CommError::DeviceRejected)
        );
    }

    #[test]
    fn test_query_resolution_decode() {
        assert_eq!(
            decode_query_resolution(&ack_with(&[(7, 1), (4, 6), (10, 1)])),
            Ok(DistanceResolution::Fine)
        );
        assert_eq!(
            decode_query_resolution(&ack_with(&[(7, 1), (4, 6)])),
            Ok(DistanceResolution::Coarse)
        );
        assert_eq!(
            decode_query_resolution(&ack_with(&[(7, 1), (4, 4), (10, 1)])),
            Err(CommError::DeviceRejected)
        );
    }
}
