//! Host-side driver for the HLK-LD2410 radar presence sensor.
//!
//! The sensor speaks a framed binary protocol over UART with two channels
//! sharing one wire: a command/acknowledgement channel
//! (`FD FC FB FA … 04 03 02 01`) and a measurement report channel
//! (`F4 F3 F2 F1 … F8 F7 F6 F5`). This crate builds command frames, runs
//! blocking command transactions with acknowledgement checking, and decodes
//! measurement reports into validated numeric fields.
//!
//! The entry point is [`Session`], which owns a [`Transport`] (anything with
//! blocking write/read and a notion of "bytes available") and tracks the
//! config-mode state plus the last measurement snapshot. Behavioral
//! interpretation of the measurements — presence thresholds, hysteresis —
//! is left to the caller.
//!
//! ```no_run
//! use ld2410_proto::{Session, Transport};
//! # struct Uart;
//! # impl Transport for Uart {
//! #     fn write(&mut self, _data: &[u8]) {}
//! #     fn bytes_available(&self) -> usize { 0 }
//! #     fn read(&mut self) -> Vec<u8> { Vec::new() }
//! # }
//! # fn open_uart() -> Uart { Uart }
//!
//! let mut session = Session::new(open_uart());
//! println!("firmware: {}", session.firmware_version()?);
//!
//! let measurement = session.request_report()?;
//! if !session.has_communication_error() {
//!     println!("{measurement}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod command;
pub mod frame;
pub mod report;
pub mod session;
pub mod types;

pub use command::{Ack, CommError, MacAddress};
pub use report::{Measurement, ReportError, TargetState};
pub use session::{
    Session, SessionError, SessionMode, Transport, ACK_TIMEOUT, DEFAULT_BLUETOOTH_KEY,
    DEFAULT_BLUETOOTH_PASSWORD, REPORT_TIMEOUT,
};
pub use types::{gate, sensitivity, BaudRate, DistanceResolution, Gate, Sensitivity};
