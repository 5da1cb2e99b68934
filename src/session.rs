//! Blocking sensor session: owns the transport, the current [`SessionMode`]
//! and the last measurement snapshot, and exposes the device commands.
//!
//! One transaction is in flight at a time; every write is followed by a fixed
//! sleep and a single read. There is no retry and no reassembly of responses
//! split across reads.

use std::thread;
use std::time::Duration;

use log::{debug, trace, warn};
use snafu::{ensure, Snafu};

use crate::command::{self, Ack, CommError, MacAddress};
use crate::frame;
use crate::report::{self, Measurement, ReportError};
use crate::types::{BaudRate, DistanceResolution, Gate, Sensitivity};

/// Fixed settle time before reading a command acknowledgement.
pub const ACK_TIMEOUT: Duration = Duration::from_millis(20);
/// Fixed settle time before reading a triggered report.
pub const REPORT_TIMEOUT: Duration = Duration::from_millis(100);

/// Factory default Bluetooth permission key (command 0x00A8).
pub const DEFAULT_BLUETOOTH_KEY: [u8; 8] = *b"HiLinkHi";
/// Factory default Bluetooth password (command 0x00A9).
pub const DEFAULT_BLUETOOTH_PASSWORD: [u8; 6] = *b"HiLink";

/// Abstract byte transport to the sensor, typically a UART.
///
/// `read` returns whatever is currently buffered; that may be fewer bytes
/// than the device sent, and the session does not stitch reads together.
pub trait Transport {
    /// Write `data` to the device.
    fn write(&mut self, data: &[u8]);
    /// Number of bytes ready to be read.
    fn bytes_available(&self) -> usize;
    /// Take everything currently buffered.
    fn read(&mut self) -> Vec<u8>;
}

/// Whether the device has acknowledged entering config mode.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum SessionMode {
    Normal,
    Config,
}

/// Error type for session operations.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum SessionError {
    /// A parameter-writing command was issued without entering config mode.
    #[snafu(display("command requires config mode"))]
    NotInConfigMode,
    /// The command transaction failed.
    #[snafu(context(false), display("{source}"))]
    Comm { source: CommError },
    /// The triggered report couldn't be decoded.
    #[snafu(context(false), display("{source}"))]
    Report { source: ReportError },
}

/// A session with one LD2410 sensor.
///
/// # Example
///
/// ```
/// use ld2410_proto::{Session, Transport};
///
/// struct Loopback(Vec<u8>);
///
/// impl Transport for Loopback {
///     fn write(&mut self, _data: &[u8]) {
///         // canned acknowledgement: success flag at offset 7
///         self.0 = vec![0xfd, 0xfc, 0xfb, 0xfa, 4, 0, 0xff, 1, 0, 0, 4, 3, 2, 1];
///     }
///     fn bytes_available(&self) -> usize {
///         self.0.len()
///     }
///     fn read(&mut self) -> Vec<u8> {
///         std::mem::take(&mut self.0)
///     }
/// }
///
/// let mut session = Session::new(Loopback(Vec::new()));
/// session.enter_config().unwrap();
/// session.exit_config().unwrap();
/// assert!(!session.has_communication_error());
/// ```
#[derive(Debug)]
pub struct Session<T: Transport> {
    transport: T,
    mode: SessionMode,
    measurement: Measurement,
    communication_error: bool,
}

impl<T: Transport> Session<T> {
    /// Create a session over an exclusively owned transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            mode: SessionMode::Normal,
            measurement: Measurement::default(),
            communication_error: false,
        }
    }

    /// Give the transport back, ending the session.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// The current session mode.
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// The last measurement snapshot. Zeroed after a communication failure.
    pub fn last_measurement(&self) -> Measurement {
        self.measurement
    }

    /// True after a report request went unanswered; cleared by the next
    /// successfully parsed report.
    pub fn has_communication_error(&self) -> bool {
        self.communication_error
    }

    fn transact(&mut self, payload: &[u8]) -> Result<Ack, CommError> {
        trace!("command: {}", frame::hex(payload));
        let ack = command::execute(&mut self.transport, payload, ACK_TIMEOUT)?;
        trace!("ack: {}", frame::hex(ack.as_bytes()));
        Ok(ack)
    }

    fn require_config(&self) -> Result<(), SessionError> {
        ensure!(self.mode == SessionMode::Config, NotInConfigModeSnafu);
        Ok(())
    }

    /// Enable config mode (0x00FF). Must succeed before any parameter-writing
    /// command is issued.
    pub fn enter_config(&mut self) -> Result<(), CommError> {
        let ack = self.transact(&command::enable_config())?;
        command::decode_simple(&ack)?;
        self.mode = SessionMode::Config;
        debug!("config mode enabled");
        Ok(())
    }

    /// End config mode (0x00FE), returning the device to normal reporting.
    pub fn exit_config(&mut self) -> Result<(), CommError> {
        let ack = self.transact(&command::end_config())?;
        command::decode_simple(&ack)?;
        self.mode = SessionMode::Normal;
        debug!("config mode ended");
        Ok(())
    }

    /// Configure the maximum moving/resting distance gates and the
    /// no-target timeout in seconds (0x0060).
    pub fn set_max_gate_and_duration(
        &mut self,
        moving_gate: Gate,
        resting_gate: Gate,
        timeout_s: u16,
    ) -> Result<(), SessionError> {
        self.require_config()?;
        let payload = command::set_max_gate_and_duration(moving_gate, resting_gate, timeout_s);
        let ack = self.transact(&payload)?;
        command::decode_gate_and_duration(&ack)?;
        debug!(
            "max gates set to {}/{}, timeout {timeout_s} s",
            *moving_gate, *resting_gate
        );
        Ok(())
    }

    /// Read the current gate and sensitivity settings (0x0061).
    ///
    /// Returns the raw acknowledgement; structured decoding of the setting
    /// table is an extension point.
    pub fn read_parameters(&mut self) -> Result<Ack, CommError> {
        let ack = self.transact(&command::read_parameters())?;
        command::decode_simple(&ack)?;
        Ok(ack)
    }

    /// Enable engineering mode reports (0x0062).
    pub fn enable_engineering_mode(&mut self) -> Result<(), SessionError> {
        self.require_config()?;
        let ack = self.transact(&command::enable_engineering())?;
        command::decode_simple(&ack)?;
        debug!("engineering mode enabled");
        Ok(())
    }

    /// End engineering mode reports (0x0063).
    pub fn end_engineering_mode(&mut self) -> Result<(), CommError> {
        let ack = self.transact(&command::end_engineering())?;
        command::decode_simple(&ack)?;
        debug!("engineering mode ended");
        Ok(())
    }

    /// Configure one gate's motion and standstill sensitivities (0x0064).
    pub fn set_gate_sensitivity(
        &mut self,
        gate: Gate,
        motion: Sensitivity,
        still: Sensitivity,
    ) -> Result<(), SessionError> {
        self.require_config()?;
        let payload = command::set_gate_sensitivity(gate, motion, still);
        let ack = self.transact(&payload)?;
        command::decode_simple(&ack)?;
        debug!("gate {} sensitivity set to {}/{}", *gate, *motion, *still);
        Ok(())
    }

    /// Read the firmware version string (0x00A0).
    pub fn firmware_version(&mut self) -> Result<String, CommError> {
        let ack = self.transact(&command::read_firmware_version())?;
        let version = command::decode_firmware_version(&ack)?;
        debug!("firmware {version}");
        Ok(version)
    }

    /// Select a serial baud rate from the device table (0x00A1). Takes
    /// effect after a reboot.
    pub fn set_baud_rate(&mut self, baud: BaudRate) -> Result<(), CommError> {
        let ack = self.transact(&command::set_baud_rate(baud))?;
        command::decode_simple(&ack)?;
        debug!("baud rate set to {baud}");
        Ok(())
    }

    /// Restore factory settings (0x00A2).
    pub fn restore_factory_settings(&mut self) -> Result<(), CommError> {
        let ack = self.transact(&command::factory_reset())?;
        command::decode_simple(&ack)
    }

    /// Reboot the module (0x00A3).
    pub fn reboot(&mut self) -> Result<(), CommError> {
        let ack = self.transact(&command::reboot())?;
        command::decode_simple(&ack)
    }

    /// Switch the Bluetooth radio on or off (0x00A4).
    pub fn set_bluetooth(&mut self, enabled: bool) -> Result<(), SessionError> {
        self.require_config()?;
        let ack = self.transact(&command::set_bluetooth(enabled))?;
        command::decode_simple(&ack)?;
        debug!("bluetooth {}", if enabled { "on" } else { "off" });
        Ok(())
    }

    /// Read the Bluetooth MAC address (0x00A5).
    pub fn mac_address(&mut self) -> Result<MacAddress, CommError> {
        let ack = self.transact(&command::get_mac_address())?;
        command::decode_mac_address(&ack)
    }

    /// Obtain Bluetooth permissions with an 8 byte key (0x00A8); the factory
    /// key is [`DEFAULT_BLUETOOTH_KEY`].
    pub fn obtain_bluetooth_permission(&mut self, key: &[u8; 8]) -> Result<(), CommError> {
        let ack = self.transact(&command::bluetooth_permission(key))?;
        command::decode_bluetooth_permission(&ack)
    }

    /// Set the 6 byte Bluetooth password (0x00A9); the factory password is
    /// [`DEFAULT_BLUETOOTH_PASSWORD`].
    pub fn set_bluetooth_password(&mut self, password: &[u8; 6]) -> Result<(), CommError> {
        let ack = self.transact(&command::set_bluetooth_password(password))?;
        command::decode_simple(&ack)
    }

    /// Set the per-gate distance resolution (0x00AA). Takes effect after a
    /// reboot.
    pub fn set_distance_resolution(
        &mut self,
        resolution: DistanceResolution,
    ) -> Result<(), SessionError> {
        self.require_config()?;
        let ack = self.transact(&command::set_resolution(resolution))?;
        command::decode_set_resolution(resolution, &ack)?;
        debug!("distance resolution set to {resolution}");
        Ok(())
    }

    /// Query the configured distance resolution (0x00AB).
    pub fn query_distance_resolution(&mut self) -> Result<DistanceResolution, CommError> {
        let ack = self.transact(&command::query_resolution())?;
        command::decode_query_resolution(&ack)
    }

    /// Trigger a measurement report and decode it.
    ///
    /// An unanswered request does not fail the call: the snapshot is zeroed,
    /// the sticky communication error flag is raised and the zeroed
    /// measurement is returned. The flag stays up until a later report
    /// parses successfully. A malformed report leaves the snapshot and the
    /// flag untouched and surfaces the parse error.
    pub fn request_report(&mut self) -> Result<Measurement, SessionError> {
        self.transport.write(&frame::encode_report_trigger());
        // Drop stale buffered bytes so an old frame isn't taken for the
        // fresh report. The response itself arrives during the sleep.
        let _ = self.transport.read();
        thread::sleep(REPORT_TIMEOUT);

        if self.transport.bytes_available() == 0 {
            warn!("no response to report request");
            self.measurement = Measurement::default();
            self.communication_error = true;
            return Ok(self.measurement);
        }

        let data = self.transport.read();
        trace!("report: {}", frame::hex(&data));
        let measurement = report::parse_report(&data)?;
        self.measurement = measurement;
        self.communication_error = false;
        Ok(measurement)
    }
}
