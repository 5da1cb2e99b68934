#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;

use ld2410_proto::Transport;

/// Scripted stand-in for the sensor's UART.
///
/// Responses are queued per command: a `write` puts the next scripted
/// response "in flight", and it becomes readable only once the caller polls
/// `bytes_available` — mirroring a device that needs the settle time before
/// its reply is buffered. A read before that (the session's stale-byte
/// drain) sees only the `stale` bytes, if any were planted.
pub struct ScriptedTransport {
    written: Vec<Vec<u8>>,
    stale: Vec<u8>,
    responses: VecDeque<Vec<u8>>,
    wire: RefCell<Wire>,
}

#[derive(Default)]
struct Wire {
    in_flight: Option<Vec<u8>>,
    delivered: Option<Vec<u8>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        ScriptedTransport {
            written: Vec::new(),
            stale: Vec::new(),
            responses: VecDeque::new(),
            wire: RefCell::new(Wire::default()),
        }
    }

    /// Queue the response to the next command frame.
    pub fn respond_with(&mut self, frame: &[u8]) {
        self.responses.push_back(frame.to_vec());
    }

    /// Plant bytes that are already buffered before the next command.
    pub fn plant_stale(&mut self, bytes: &[u8]) {
        self.stale = bytes.to_vec();
    }

    pub fn written_frames(&self) -> &[Vec<u8>] {
        &self.written
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, data: &[u8]) {
        self.written.push(data.to_vec());
        self.wire.borrow_mut().in_flight = self.responses.pop_front();
    }

    fn bytes_available(&self) -> usize {
        let mut wire = self.wire.borrow_mut();
        if wire.delivered.is_none() {
            wire.delivered = wire.in_flight.take();
        }
        wire.delivered.as_ref().map_or(0, Vec::len)
    }

    fn read(&mut self) -> Vec<u8> {
        let mut wire = self.wire.borrow_mut();
        match wire.delivered.take() {
            Some(frame) => frame,
            None => std::mem::take(&mut self.stale),
        }
    }
}

/// A command-channel acknowledgement frame with the given byte values set,
/// zero elsewhere. Offsets are into the whole frame, like the session sees
/// them; the frame is 22 bytes so version/MAC offsets up to 17 fit.
pub fn ack_with(values: &[(usize, u8)]) -> Vec<u8> {
    let mut frame = vec![0u8; 22];
    frame[..4].copy_from_slice(&[0xfd, 0xfc, 0xfb, 0xfa]);
    frame[18..].copy_from_slice(&[0x04, 0x03, 0x02, 0x01]);
    for (offset, value) in values {
        frame[*offset] = *value;
    }
    frame
}

/// The plain "success" acknowledgement.
pub fn ok_ack() -> Vec<u8> {
    ack_with(&[(7, 1)])
}

/// A Basic report frame with the canonical field values.
pub fn basic_report() -> Vec<u8> {
    vec![
        0xf4, 0xf3, 0xf2, 0xf1, 0x0d, 0x00, 0x02, 0xaa, 0x03, 0x4f, 0x00, 0x64, 0x4c, 0x00, 0x64,
        0x32, 0x00, 0x55, 0x00, 0xf8, 0xf7, 0xf6, 0xf5,
    ]
}
