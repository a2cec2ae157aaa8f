//! # Command Protocol
//!
//! Single-letter commands over a byte transport, arguments in ASCII hex:
//!
//! | command | arguments | reply |
//! |---------|-----------|-------|
//! | `r` | address (4 digits) | `R`, then the byte read as 2 digits |
//! | `w` | address (4), value (2) | `W` |
//! | `b` | start (4), size (4), then `size` raw bytes | `B`, then `size` raw verify bytes |
//!
//! Letters are case-insensitive. The acknowledgment goes out as soon as the
//! command is recognized, before its arguments are read. Accepted hex digits
//! are echoed when enabled. Anything else on the command position is
//! ignored without reply. A command that fails on a timeout is answered
//! with [`NAK`].

use crate::bridge::Bridge;
use crate::config::ProtocolConfig;
use crate::error::BridgeError;
use crate::hardware::BusPort;
use crate::hex;
use crate::transport::ByteTransport;
use crate::types::Address;

/// Negative acknowledgment: the command was recognized but did not complete.
pub const NAK: u8 = b'!';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ReadByte,
    WriteByte,
    BlockLoad,
}

impl Command {
    pub fn from_byte(byte: u8) -> Option<Command> {
        match byte.to_ascii_lowercase() {
            b'r' => Some(Command::ReadByte),
            b'w' => Some(Command::WriteByte),
            b'b' => Some(Command::BlockLoad),
            _ => None,
        }
    }

    pub fn letter(&self) -> u8 {
        match self {
            Command::ReadByte => b'r',
            Command::WriteByte => b'w',
            Command::BlockLoad => b'b',
        }
    }

    pub fn ack(&self) -> u8 {
        self.letter().to_ascii_uppercase()
    }
}

/// Read-decode-execute loop in front of a [`Bridge`].
pub struct CommandServer<P: BusPort> {
    bridge: Bridge<P>,
    config: ProtocolConfig,
    commands: u64,
    naks: u64,
}

impl<P: BusPort> CommandServer<P> {
    pub fn new(bridge: Bridge<P>, config: ProtocolConfig) -> Self {
        CommandServer {
            bridge,
            config,
            commands: 0,
            naks: 0,
        }
    }

    pub fn bridge(&self) -> &Bridge<P> {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut Bridge<P> {
        &mut self.bridge
    }

    pub fn into_bridge(self) -> Bridge<P> {
        self.bridge
    }

    pub fn commands_handled(&self) -> u64 {
        self.commands
    }

    pub fn naks_sent(&self) -> u64 {
        self.naks
    }

    /// Handles one command position. Returns the command executed, or `None`
    /// when the byte was not a command. Errors on the command position itself
    /// (idle timeout, closed transport) are returned unchanged.
    pub fn step<T: ByteTransport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<Option<Command>, BridgeError> {
        let byte = transport.receive()?;
        let Some(command) = Command::from_byte(byte) else {
            log::debug!("ignoring non-command byte {byte:#04x}");
            return Ok(None);
        };

        log::debug!("command '{}'", command.letter() as char);
        transport.send(command.ack())?;
        transport.flush()?;
        match self.execute(command, transport) {
            Ok(()) => {}
            Err(err) if err.is_recoverable() => {
                log::warn!("command '{}' failed: {err}", command.letter() as char);
                self.naks += 1;
                transport.send(NAK)?;
            }
            Err(err) => return Err(err),
        }
        transport.flush()?;
        self.commands += 1;
        Ok(Some(command))
    }

    /// Serves commands until the transport closes.
    pub fn serve<T: ByteTransport + ?Sized>(&mut self, transport: &mut T) -> Result<(), BridgeError> {
        log::info!("bridge ready, echo {}", if self.config.echo_input { "on" } else { "off" });
        loop {
            match self.step(transport) {
                Ok(_) | Err(BridgeError::InputTimeout) => {}
                Err(BridgeError::TransportClosed) => {
                    log::info!(
                        "transport closed after {} commands ({} failed)",
                        self.commands,
                        self.naks
                    );
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn execute<T: ByteTransport + ?Sized>(
        &mut self,
        command: Command,
        transport: &mut T,
    ) -> Result<(), BridgeError> {
        let echo = self.config.echo_input;
        match command {
            Command::ReadByte => {
                let address = Address::new(hex::read_word(transport, echo)?);
                let value = self.bridge.read_byte(address)?;
                hex::write_byte(transport, value)
            }
            Command::WriteByte => {
                let address = Address::new(hex::read_word(transport, echo)?);
                let value = hex::read_byte(transport, echo)?;
                self.bridge.write_byte(address, value)
            }
            Command::BlockLoad => {
                let start = Address::new(hex::read_word(transport, echo)?);
                let size = hex::read_word(transport, echo)?;
                self.bridge.load_block(start, size, transport)
            }
        }
    }
}
