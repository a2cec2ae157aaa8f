//! # Byte Transports
//!
//! The command protocol only needs a blocking byte-in/byte-out link. Any
//! `Read`/`Write` pair (stdio, TCP, a serial device) becomes a transport
//! through `StreamTransport`; `ChannelTransport` links two endpoints inside
//! one process and `ScriptedTransport` replays canned input for tests.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::error::BridgeError;

pub trait ByteTransport {
    fn send(&mut self, byte: u8) -> Result<(), BridgeError>;

    /// Blocks for the next byte. A bounded wait that expires reports
    /// `InputTimeout`; a peer that went away reports `TransportClosed`.
    fn receive(&mut self) -> Result<u8, BridgeError>;

    fn send_all(&mut self, bytes: &[u8]) -> Result<(), BridgeError> {
        for &byte in bytes {
            self.send(byte)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }

    /// Longest wait in `receive` before it reports `InputTimeout`. `None`
    /// means it can block indefinitely.
    fn read_timeout(&self) -> Option<Duration> {
        None
    }
}

impl<T: ByteTransport + ?Sized> ByteTransport for Box<T> {
    fn send(&mut self, byte: u8) -> Result<(), BridgeError> {
        (**self).send(byte)
    }

    fn receive(&mut self) -> Result<u8, BridgeError> {
        (**self).receive()
    }

    fn send_all(&mut self, bytes: &[u8]) -> Result<(), BridgeError> {
        (**self).send_all(bytes)
    }

    fn flush(&mut self) -> Result<(), BridgeError> {
        (**self).flush()
    }

    fn read_timeout(&self) -> Option<Duration> {
        (**self).read_timeout()
    }
}

/// Transport over any reader/writer pair.
pub struct StreamTransport<R: Read, W: Write> {
    reader: R,
    writer: W,
    read_timeout: Option<Duration>,
}

impl<R: Read, W: Write> StreamTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        StreamTransport {
            reader,
            writer,
            read_timeout: None,
        }
    }

    /// Records the read timeout already configured on `reader`.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl StreamTransport<io::Stdin, io::Stdout> {
    pub fn stdio() -> Self {
        StreamTransport::new(io::stdin(), io::stdout())
    }
}

impl StreamTransport<TcpStream, TcpStream> {
    pub fn tcp(stream: TcpStream, read_timeout: Option<Duration>) -> Result<Self, BridgeError> {
        stream.set_read_timeout(read_timeout)?;
        stream.set_nodelay(true)?;
        let reader = stream.try_clone()?;
        Ok(StreamTransport::new(reader, stream).with_read_timeout(read_timeout))
    }
}

pub type SerialTransport =
    StreamTransport<Box<dyn serialport::SerialPort>, Box<dyn serialport::SerialPort>>;

/// Opens a serial device as 8N1 without flow control.
pub fn open_serial(path: &str, baud_rate: u32, timeout: Duration) -> Result<SerialTransport, BridgeError> {
    let port = serialport::new(path, baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(timeout)
        .open()?;
    let reader = port.try_clone()?;
    log::info!("opened serial port {path} at {baud_rate} baud");
    Ok(StreamTransport::new(reader, port).with_read_timeout(Some(timeout)))
}

impl<R: Read, W: Write> ByteTransport for StreamTransport<R, W> {
    fn send(&mut self, byte: u8) -> Result<(), BridgeError> {
        match self.writer.write_all(&[byte]) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Err(BridgeError::TransportClosed),
            Err(e) => Err(e.into()),
        }
    }

    fn receive(&mut self) -> Result<u8, BridgeError> {
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Err(BridgeError::TransportClosed),
                Ok(_) => return Ok(buf[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    return Err(BridgeError::InputTimeout)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn flush(&mut self) -> Result<(), BridgeError> {
        self.writer.flush()?;
        Ok(())
    }

    fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }
}

/// One end of an in-process full-duplex link.
pub struct ChannelTransport {
    tx: Sender<u8>,
    rx: Receiver<u8>,
    timeout: Option<Duration>,
}

impl ChannelTransport {
    /// Two connected endpoints; bytes sent on one are received on the other.
    pub fn pair(timeout: Option<Duration>) -> (ChannelTransport, ChannelTransport) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (
            ChannelTransport {
                tx: a_tx,
                rx: a_rx,
                timeout,
            },
            ChannelTransport {
                tx: b_tx,
                rx: b_rx,
                timeout,
            },
        )
    }
}

impl ByteTransport for ChannelTransport {
    fn send(&mut self, byte: u8) -> Result<(), BridgeError> {
        self.tx.send(byte).map_err(|_| BridgeError::TransportClosed)
    }

    fn receive(&mut self) -> Result<u8, BridgeError> {
        match self.timeout {
            Some(timeout) => self.rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => BridgeError::InputTimeout,
                RecvTimeoutError::Disconnected => BridgeError::TransportClosed,
            }),
            None => self.rx.recv().map_err(|_| BridgeError::TransportClosed),
        }
    }

    fn read_timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Incoming {
    Byte(u8),
    Timeout,
}

/// Replays queued input and records everything sent. Running out of input
/// reads as a closed transport.
#[derive(Debug, Default, Clone)]
pub struct ScriptedTransport {
    input: VecDeque<Incoming>,
    output: Vec<u8>,
}

impl ScriptedTransport {
    pub fn new(input: impl AsRef<[u8]>) -> Self {
        let mut transport = ScriptedTransport::default();
        transport.push_input(input);
        transport
    }

    pub fn push_input(&mut self, input: impl AsRef<[u8]>) {
        self.input
            .extend(input.as_ref().iter().map(|&b| Incoming::Byte(b)));
    }

    /// Queues one expired input wait.
    pub fn push_timeout(&mut self) {
        self.input.push_back(Incoming::Timeout);
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    pub fn remaining_input(&self) -> usize {
        self.input.len()
    }
}

impl ByteTransport for ScriptedTransport {
    fn send(&mut self, byte: u8) -> Result<(), BridgeError> {
        self.output.push(byte);
        Ok(())
    }

    fn receive(&mut self) -> Result<u8, BridgeError> {
        match self.input.pop_front() {
            Some(Incoming::Byte(byte)) => Ok(byte),
            Some(Incoming::Timeout) => Err(BridgeError::InputTimeout),
            None => Err(BridgeError::TransportClosed),
        }
    }

    fn read_timeout(&self) -> Option<Duration> {
        Some(Duration::ZERO)
    }
}
