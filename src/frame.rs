//! Framing for the two LD2410 wire channels: the command/ack channel and the
//! data-report channel. Both share one UART but use distinct header and
//! terminator markers.
//!
//! A frame is `header(4) || length(2, LE) || payload(length) || terminator(4)`.

use core::fmt::Write;

use nom::bytes::complete::{tag, take};
use nom::combinator::all_consuming;
use nom::number::complete::le_u16;
use nom::IResult;

/// Header marking a command or acknowledgement frame.
pub const COMMAND_HEADER: [u8; 4] = [0xfd, 0xfc, 0xfb, 0xfa];
/// Terminator of a command or acknowledgement frame.
pub const COMMAND_TERMINATOR: [u8; 4] = [0x04, 0x03, 0x02, 0x01];
/// Header marking a measurement report frame.
pub const REPORT_HEADER: [u8; 4] = [0xf4, 0xf3, 0xf2, 0xf1];
/// Terminator of a measurement report frame.
pub const REPORT_TERMINATOR: [u8; 4] = [0xf8, 0xf7, 0xf6, 0xf5];

/// Declared payload length of a Basic mode report.
pub(crate) const REPORT_LEN_BASIC: u8 = 0x0d;
/// Declared payload length of an Engineering mode report.
pub(crate) const REPORT_LEN_ENGINEERING: u8 = 0x23;
/// Fixed marker at offset 7 of every report frame.
pub(crate) const REPORT_HEAD: u8 = 0xaa;

/// Smallest acknowledgement worth looking at: header + length + two bytes of
/// command echo + terminator, with the result byte at offset 7 present.
pub(crate) const MIN_ACK_LEN: usize = 10;
/// Smallest complete Basic report frame.
pub(crate) const MIN_REPORT_LEN: usize = 23;

/// Wrap `payload` in the command framing.
///
/// No upper bound is enforced here; a payload longer than `u16::MAX` is a
/// caller logic error (the length field would wrap).
pub fn encode_command(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 10);
    frame.extend_from_slice(&COMMAND_HEADER);
    frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&COMMAND_TERMINATOR);
    frame
}

/// Build the "request a report" frame.
///
/// Structurally a command frame with a two byte zero payload, but framed with
/// the report markers instead of the command markers.
pub fn encode_report_trigger() -> Vec<u8> {
    let payload = [0x00, 0x00];
    let mut frame = Vec::with_capacity(payload.len() + 10);
    frame.extend_from_slice(&REPORT_HEADER);
    frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&REPORT_TERMINATOR);
    frame
}

fn command_envelope(buf: &[u8]) -> IResult<&[u8], &[u8]> {
    let (buf, _) = tag(&COMMAND_HEADER[..])(buf)?;
    let (buf, len) = le_u16(buf)?;
    let (buf, payload) = take(len)(buf)?;
    let (buf, _) = tag(&COMMAND_TERMINATOR[..])(buf)?;
    Ok((buf, payload))
}

/// Strip the command framing from `buf`, returning the payload.
///
/// Returns `None` unless `buf` is exactly one well-formed command frame.
pub fn decode_command_envelope(buf: &[u8]) -> Option<&[u8]> {
    all_consuming(command_envelope)(buf).ok().map(|(_, p)| p)
}

/// True iff `buf` is long enough to be interpreted as an acknowledgement.
pub fn is_ack_frame_shape_valid(buf: &[u8]) -> bool {
    buf.len() >= MIN_ACK_LEN
}

/// True iff `buf` passes the report sanity checks: minimum length, report
/// header, a declared length of 0x0d or 0x23 and the 0xaa head marker.
pub fn is_report_frame_shape_valid(buf: &[u8]) -> bool {
    buf.len() >= MIN_REPORT_LEN
        && buf[..4] == REPORT_HEADER
        && (buf[4] == REPORT_LEN_BASIC || buf[4] == REPORT_LEN_ENGINEERING)
        && buf[7] == REPORT_HEAD
}

/// Render `data` as space-separated hex octets, for trace logging.
pub(crate) fn hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for byte in data {
        if !out.is_empty() {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02x}");
    }
    out
}
