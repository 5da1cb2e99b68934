//! Decoding of the sensor's measurement report frames into a [`Measurement`].
//!
//! Reports arrive on the data channel framed with [`REPORT_HEADER`] /
//! [`REPORT_TERMINATOR`](crate::frame::REPORT_TERMINATOR). A Basic report
//! declares a payload length of 0x0d, an Engineering report 0x23; the
//! per-gate energy table appended in Engineering mode is not decoded here,
//! only the common leading fields are.

use core::fmt;

use nom::number::complete::{le_u16, u8 as any_u8};
use nom::sequence::tuple;
use snafu::{ensure, Snafu};

use crate::frame::{
    REPORT_HEAD, REPORT_HEADER, REPORT_LEN_BASIC, REPORT_LEN_ENGINEERING, MIN_REPORT_LEN,
};

/// Error type for report decoding.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReportError {
    /// The buffer can't hold even a Basic report.
    #[snafu(display("report frame too short ({len} bytes)"))]
    TooShort { len: usize },
    /// The first four bytes aren't the report header.
    #[snafu(display("report frame header mismatch"))]
    BadHeader,
    /// The declared payload length is neither Basic nor Engineering.
    #[snafu(display("report frame declared length {len:#04x} is invalid"))]
    BadLength { len: u8 },
    /// The fixed 0xaa marker at offset 7 is missing.
    #[snafu(display("report head marker is {head:#04x}, expected 0xaa"))]
    BadReportHead { head: u8 },
    /// The state byte names no known target state.
    #[snafu(display("unknown target state {value:#04x}"))]
    UnknownState { value: u8 },
}

/// Detection state reported by the sensor.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash, Default)]
#[repr(u8)]
pub enum TargetState {
    #[default]
    NoTarget = 0,
    MovingTarget = 1,
    StationaryTarget = 2,
    CombinedTarget = 3,
}

impl TryFrom<u8> for TargetState {
    type Error = ReportError;

    /// Any raw value above 3 is a protocol violation and is rejected rather
    /// than mapped to a default.
    fn try_from(value: u8) -> Result<Self, ReportError> {
        match value {
            0 => Ok(Self::NoTarget),
            1 => Ok(Self::MovingTarget),
            2 => Ok(Self::StationaryTarget),
            3 => Ok(Self::CombinedTarget),
            _ => UnknownStateSnafu { value }.fail(),
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoTarget => "no target",
            Self::MovingTarget => "moving target",
            Self::StationaryTarget => "stationary target",
            Self::CombinedTarget => "combined target",
        })
    }
}

/// One decoded measurement snapshot. Distances are in centimeters, energies
/// in the sensor's 0..=100 scale.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Default)]
pub struct Measurement {
    pub state: TargetState,
    pub moving_distance: u16,
    pub moving_energy: u8,
    pub stationary_distance: u16,
    pub stationary_energy: u8,
    pub detection_distance: u16,
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "state: {}", self.state)?;
        writeln!(f, "moving distance: {} cm", self.moving_distance)?;
        writeln!(f, "moving energy: {}", self.moving_energy)?;
        writeln!(f, "stationary distance: {} cm", self.stationary_distance)?;
        writeln!(f, "stationary energy: {}", self.stationary_energy)?;
        write!(f, "detection distance: {} cm", self.detection_distance)
    }
}

// state, moving distance/energy, stationary distance/energy, detection distance
type RawFields = (u8, u16, u8, u16, u8, u16);

fn report_fields(buf: &[u8]) -> nom::IResult<&[u8], RawFields> {
    tuple((any_u8, le_u16, any_u8, le_u16, any_u8, le_u16))(buf)
}

/// Decode a report frame into a [`Measurement`].
///
/// All offsets are validated before access; a truncated or damaged buffer
/// yields a typed [`ReportError`], never a panic. The report type byte at
/// offset 6 is not checked, acceptance is gated on the declared length and
/// the 0xaa head marker alone.
pub fn parse_report(buf: &[u8]) -> Result<Measurement, ReportError> {
    ensure!(buf.len() >= MIN_REPORT_LEN, TooShortSnafu { len: buf.len() });
    ensure!(buf[..4] == REPORT_HEADER, BadHeaderSnafu);
    ensure!(
        buf[4] == REPORT_LEN_BASIC || buf[4] == REPORT_LEN_ENGINEERING,
        BadLengthSnafu { len: buf[4] }
    );
    ensure!(buf[7] == REPORT_HEAD, BadReportHeadSnafu { head: buf[7] });

    // Nine bytes starting at the state byte; present in every accepted frame.
    let fields = &buf[8..17];
    let (_, (state, moving_distance, moving_energy, stationary_distance, stationary_energy, detection_distance)) =
        report_fields(fields)
            .map_err(|_: nom::Err<nom::error::Error<&[u8]>>| TooShortSnafu { len: buf.len() }.build())?;

    Ok(Measurement {
        state: TargetState::try_from(state)?,
        moving_distance,
        moving_energy,
        stationary_distance,
        stationary_energy,
        detection_distance,
    })
}
