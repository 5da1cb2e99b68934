use anyhow::{bail, Context, Result};
use std::io::{Read, Write};
use std::iter::Peekable;
use std::str::{FromStr, SplitWhitespace};

use ld2410_proto::{
    gate, sensitivity, BaudRate, DistanceResolution, Session, Transport, DEFAULT_BLUETOOTH_KEY,
};

struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) {
        if self.port.write_all(data).and_then(|_| self.port.flush()).is_err() {
            eprintln!("serial write failed");
        }
    }

    fn bytes_available(&self) -> usize {
        self.port.bytes_to_read().unwrap_or(0) as usize
    }

    fn read(&mut self) -> Vec<u8> {
        let mut buf = vec![0; self.bytes_available().max(1)];
        match self.port.read(&mut buf) {
            Ok(len) => {
                buf.truncate(len);
                buf
            }
            Err(_) => Vec::new(),
        }
    }
}

fn cmd_report(session: &mut Session<SerialTransport>) -> Result<()> {
    let measurement = session.request_report()?;
    if session.has_communication_error() {
        bail!("no report from the sensor");
    }
    println!("{measurement}");
    Ok(())
}

fn cmd_gates(args: &mut CmdScanner, session: &mut Session<SerialTransport>) -> Result<()> {
    let moving = gate(args.parse_next()?);
    let resting = gate(args.parse_next()?);
    let timeout: u16 = args.parse_next()?;
    session.set_max_gate_and_duration(moving, resting, timeout)?;
    Ok(())
}

fn cmd_sensitivity(args: &mut CmdScanner, session: &mut Session<SerialTransport>) -> Result<()> {
    let g = gate(args.parse_next()?);
    let motion = sensitivity(args.parse_next()?);
    let still = sensitivity(args.parse_next()?);
    session.set_gate_sensitivity(g, motion, still)?;
    Ok(())
}

fn cmd_resolution(args: &mut CmdScanner, session: &mut Session<SerialTransport>) -> Result<()> {
    let resolution = match args.next()? {
        "fine" => DistanceResolution::Fine,
        "coarse" => DistanceResolution::Coarse,
        other => bail!("unknown resolution {other}, expected fine|coarse"),
    };
    session.set_distance_resolution(resolution)?;
    println!("set {resolution}, reboot to apply");
    Ok(())
}

fn main() {
    env_logger::init();

    let mut args = std::env::args();
    args.next(); // Skip program name
    let port = args.next().unwrap_or("/dev/ttyUSB0".to_string());

    let serial = serialport::new(&port, BaudRate::default().bps())
        .timeout(std::time::Duration::from_millis(100))
        .open()
        .expect("Failed to open serial port");

    let mut stdout = std::io::stdout();

    let mut session = Session::new(SerialTransport { port: serial });
    loop {
        print!(">> ");
        stdout.flush().unwrap();
        let mut cmd = String::new();
        let mut scan = CmdScanner::read_stdin(&mut cmd);
        if let Err(err) = match scan.next() {
            Err(_) => continue,
            Ok("report") | Ok("r") => cmd_report(&mut session),
            Ok("version") => session.firmware_version().map(|v| println!("{v}")).map_err(Into::into),
            Ok("mac") => session.mac_address().map(|m| println!("{m}")).map_err(Into::into),
            Ok("config") => match scan.next() {
                Ok("on") => session.enter_config().map_err(Into::into),
                Ok("off") => session.exit_config().map_err(Into::into),
                _ => {
                    println!("usage: config on|off");
                    continue;
                }
            },
            Ok("gates") => cmd_gates(&mut scan, &mut session),
            Ok("sens") => cmd_sensitivity(&mut scan, &mut session),
            Ok("resolution") => cmd_resolution(&mut scan, &mut session),
            Ok("queryres") => session
                .query_distance_resolution()
                .map(|r| println!("{r}"))
                .map_err(Into::into),
            Ok("btperm") => session
                .obtain_bluetooth_permission(&DEFAULT_BLUETOOTH_KEY)
                .map_err(Into::into),
            Ok("reboot") => session.reboot().map_err(Into::into),
            Ok("factory") => session.restore_factory_settings().map_err(Into::into),
            Ok(cmd) => {
                println!("Unknown command {}", cmd);
                continue;
            }
        } {
            println!("{:?}", err)
        }
    }
}

struct CmdScanner<'a> {
    splt: Peekable<SplitWhitespace<'a>>,
}

impl<'a> CmdScanner<'a> {
    fn read_stdin(buf: &'a mut String) -> Self {
        buf.clear();
        std::io::stdin().read_line(buf).unwrap();
        let splt = buf.split_whitespace().peekable();
        Self { splt }
    }
    fn next(&mut self) -> Result<&str> {
        self.splt.next().context("End of stream")
    }
    fn parse_next<T: FromStr>(&mut self) -> Result<T> {
        self.next()?.parse::<T>().ok().context("Parse error")
    }
}
