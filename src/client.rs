//! Host side of the command protocol.

use crate::error::BridgeError;
use crate::hex;
use crate::protocol::{Command, NAK};
use crate::transport::ByteTransport;
use crate::types::Address;

/// Talks to a bridge over `transport`. `echo` must match the bridge's
/// `echo_input` setting; echoed digits are checked against what was sent.
pub struct BridgeClient<T: ByteTransport> {
    transport: T,
    echo: bool,
}

impl<T: ByteTransport> BridgeClient<T> {
    pub fn new(transport: T, echo: bool) -> Self {
        BridgeClient { transport, echo }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    pub fn read_byte(&mut self, address: Address) -> Result<u8, BridgeError> {
        self.begin(Command::ReadByte)?;
        self.send_digits(&hex::encode_word(address.value()))?;
        let high = self.expect_digit()?;
        let low = self.expect_digit()?;
        hex::decode_byte([high, low])
    }

    /// Sends a write. The bridge gives no completion reply; a write that
    /// fails on the bus shows up as a NAK ahead of the next reply.
    pub fn write_byte(&mut self, address: Address, value: u8) -> Result<(), BridgeError> {
        self.begin(Command::WriteByte)?;
        self.send_digits(&hex::encode_word(address.value()))?;
        self.send_digits(&hex::encode_byte(value))?;
        self.transport.flush()
    }

    /// Writes `data` at `start` and returns the bytes the bridge read back.
    ///
    /// A NAK in the verify stream is only told apart from data by the
    /// silence after it, so the transport must have a read timeout.
    pub fn load_block(&mut self, start: Address, data: &[u8]) -> Result<Vec<u8>, BridgeError> {
        let size = u16::try_from(data.len()).map_err(|_| BridgeError::BlockTooLarge(data.len()))?;
        if self.transport.read_timeout().is_none() {
            return Err(BridgeError::NoReadTimeout);
        }

        self.begin(Command::BlockLoad)?;
        self.send_digits(&hex::encode_word(start.value()))?;
        self.send_digits(&hex::encode_word(size))?;
        self.transport.send_all(data)?;
        self.transport.flush()?;

        let mut verify = Vec::with_capacity(data.len());
        while verify.len() < data.len() {
            match self.transport.receive() {
                Ok(byte) => verify.push(byte),
                // Verify bytes are raw, so a NAK is only recognizable by the
                // silence that follows it
                Err(BridgeError::InputTimeout) if verify.last() == Some(&NAK) => {
                    return Err(BridgeError::Nak)
                }
                Err(err) => return Err(err),
            }
        }
        Ok(verify)
    }

    fn begin(&mut self, command: Command) -> Result<(), BridgeError> {
        self.transport.send(command.letter())?;
        self.transport.flush()?;
        self.expect(command.ack())
    }

    fn send_digits(&mut self, digits: &[u8]) -> Result<(), BridgeError> {
        self.transport.send_all(digits)?;
        self.transport.flush()?;
        if self.echo {
            for &digit in digits {
                self.expect(digit)?;
            }
        }
        Ok(())
    }

    fn expect(&mut self, expected: u8) -> Result<(), BridgeError> {
        match self.transport.receive()? {
            found if found == expected => Ok(()),
            NAK => Err(BridgeError::Nak),
            found => Err(BridgeError::UnexpectedReply { expected, found }),
        }
    }

    fn expect_digit(&mut self) -> Result<u8, BridgeError> {
        match self.transport.receive()? {
            NAK => Err(BridgeError::Nak),
            digit => Ok(digit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChannelTransport, ScriptedTransport};

    #[test]
    fn test_read_byte_with_echo() {
        let mut client = BridgeClient::new(ScriptedTransport::new(b"R12ab5e"), true);
        assert_eq!(client.read_byte(Address::new(0x12AB)).unwrap(), 0x5E);
        assert_eq!(client.into_inner().output(), b"r12ab");
    }

    #[test]
    fn test_write_byte_without_echo() {
        let mut client = BridgeClient::new(ScriptedTransport::new(b"W"), false);
        client.write_byte(Address::new(0x00FF), 0x2A).unwrap();
        assert_eq!(client.into_inner().output(), b"w00ff2a");
    }

    #[test]
    fn test_nak_in_place_of_reply() {
        let mut client = BridgeClient::new(ScriptedTransport::new(b"R0000!"), true);
        assert!(matches!(
            client.read_byte(Address::new(0)),
            Err(BridgeError::Nak)
        ));
    }

    #[test]
    fn test_wrong_ack() {
        let mut client = BridgeClient::new(ScriptedTransport::new(b"W"), false);
        assert!(matches!(
            client.read_byte(Address::new(0)),
            Err(BridgeError::UnexpectedReply {
                expected: b'R',
                found: b'W'
            })
        ));
    }

    #[test]
    fn test_block_nak_followed_by_silence() {
        let mut transport = ScriptedTransport::new(b"B!");
        transport.push_timeout();
        let mut client = BridgeClient::new(transport, false);
        assert!(matches!(
            client.load_block(Address::new(0x10), &[1, 2, 3]),
            Err(BridgeError::Nak)
        ));
    }

    #[test]
    fn test_block_reply_carries_verify_bytes() {
        let mut client = BridgeClient::new(ScriptedTransport::new(b"B\xaa\xbb"), false);
        let verify = client.load_block(Address::new(0xFFFF), &[0xAA, 0xBB]).unwrap();
        assert_eq!(verify, vec![0xAA, 0xBB]);
        assert_eq!(client.into_inner().output(), b"bffff0002\xaa\xbb");
    }

    #[test]
    fn test_block_load_refuses_transport_without_timeout() {
        let (host, mut bridge) = ChannelTransport::pair(None);
        let mut client = BridgeClient::new(host, false);
        assert!(matches!(
            client.load_block(Address::new(0x0000), &[1, 2, 3]),
            Err(BridgeError::NoReadTimeout)
        ));
        drop(client);
        assert!(matches!(bridge.receive(), Err(BridgeError::TransportClosed)));
    }
}
