//! # Serial Transaction Executor
//!
//! Each call to [`Transport::transact`] is one complete, scoped use of the
//! line: open, (clear, write, settle), read, close. The port handle is a
//! local that drops on every return path, so no two transactions ever hold
//! the same endpoint and nothing is left open between steps.
//!
//! The modem has no ready signal. After a command the executor sleeps for a
//! fixed settle interval and then drains whatever has arrived, reading with
//! a zero timeout so an idle line returns immediately.

use std::io::{self, Read, Write};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace};

use crate::at::TERMINATOR;
use crate::config::UnlockConfig;
use crate::model::SerialEndpoint;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot open line: {0}")]
    Open(#[source] serialport::Error),
    #[error("cannot configure line: {0}")]
    Configure(#[source] serialport::Error),
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
}

/// One request/response exchange with a modem endpoint.
pub trait Transport {
    /// With `command`: clear pending input, write `command` followed by CRLF,
    /// sleep `wait`, then return up to `read_budget` bytes of whatever has
    /// arrived (possibly none).
    ///
    /// Without `command`: a port probe. Block up to `wait` for spontaneous
    /// activity and return up to `read_budget` bytes (empty means silent).
    fn transact(
        &mut self,
        endpoint: &SerialEndpoint,
        command: Option<&[u8]>,
        wait: Duration,
        read_budget: usize,
    ) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn transact(
        &mut self,
        endpoint: &SerialEndpoint,
        command: Option<&[u8]>,
        wait: Duration,
        read_budget: usize,
    ) -> Result<Vec<u8>, TransportError> {
        (**self).transact(endpoint, command, wait, read_budget)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn transact(
        &mut self,
        endpoint: &SerialEndpoint,
        command: Option<&[u8]>,
        wait: Duration,
        read_budget: usize,
    ) -> Result<Vec<u8>, TransportError> {
        (**self).transact(endpoint, command, wait, read_budget)
    }
}

// ── serialport backend ──────────────────────────────────────────────

/// [`Transport`] over a real serial device via the `serialport` crate.
#[derive(Debug, Clone)]
pub struct SerialPortTransport {
    baud_rate: u32,
    write_timeout: Duration,
}

impl SerialPortTransport {
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            write_timeout: Duration::from_secs(1),
        }
    }

    pub fn from_config(config: &UnlockConfig) -> Self {
        Self {
            baud_rate: config.baud_rate,
            write_timeout: config.write_timeout,
        }
    }

    fn open(
        &self,
        endpoint: &SerialEndpoint,
        timeout: Duration,
    ) -> Result<Box<dyn serialport::SerialPort>, TransportError> {
        serialport::new(endpoint.path(), self.baud_rate)
            .timeout(timeout)
            .open()
            .map_err(TransportError::Open)
    }

    fn probe(
        &self,
        endpoint: &SerialEndpoint,
        timeout: Duration,
        read_budget: usize,
    ) -> Result<Vec<u8>, TransportError> {
        let mut port = self.open(endpoint, timeout)?;
        debug!(%endpoint, timeout_s = timeout.as_secs(), "probing for activity");
        read_once(&mut *port, read_budget).map_err(TransportError::Read)
    }

    fn exchange(
        &self,
        endpoint: &SerialEndpoint,
        command: &[u8],
        settle: Duration,
        read_budget: usize,
    ) -> Result<Vec<u8>, TransportError> {
        let mut port = self.open(endpoint, self.write_timeout)?;
        port.clear(serialport::ClearBuffer::Input)
            .map_err(TransportError::Configure)?;

        debug!(
            %endpoint,
            command = %String::from_utf8_lossy(command),
            settle_s = settle.as_secs(),
            "sending command"
        );
        write_frame(&mut *port, command).map_err(TransportError::Write)?;

        std::thread::sleep(settle);

        port.set_timeout(Duration::ZERO)
            .map_err(TransportError::Configure)?;
        read_available(&mut *port, read_budget).map_err(TransportError::Read)
    }
}

impl Transport for SerialPortTransport {
    fn transact(
        &mut self,
        endpoint: &SerialEndpoint,
        command: Option<&[u8]>,
        wait: Duration,
        read_budget: usize,
    ) -> Result<Vec<u8>, TransportError> {
        let response = match command {
            Some(command) => self.exchange(endpoint, command, wait, read_budget)?,
            None => self.probe(endpoint, wait, read_budget)?,
        };
        trace!(%endpoint, bytes = response.len(), raw = ?String::from_utf8_lossy(&response), "response");
        Ok(response)
    }
}

// ── Framing helpers ─────────────────────────────────────────────────

/// Write `command` + CRLF as a single frame.
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, command: &[u8]) -> io::Result<()> {
    let mut frame = Vec::with_capacity(command.len() + TERMINATOR.len());
    frame.extend_from_slice(command);
    frame.extend_from_slice(TERMINATOR);
    writer.write_all(&frame)?;
    writer.flush()
}

/// One bounded read. A timeout is "no activity", not an error.
pub fn read_once<R: Read + ?Sized>(reader: &mut R, budget: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; budget];
    match reader.read(&mut buf) {
        Ok(n) => {
            buf.truncate(n);
            Ok(buf)
        }
        Err(e) if is_idle(&e) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Drain up to `budget` bytes until the reader reports no more data.
pub fn read_available<R: Read + ?Sized>(reader: &mut R, budget: usize) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(budget.min(4096));
    let mut chunk = [0u8; 512];
    while out.len() < budget {
        let want = (budget - out.len()).min(chunk.len());
        match reader.read(&mut chunk[..want]) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_idle(&e) => break,
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}

fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
