//! ASCII hex codec used on the command link.
//!
//! Input accepts either case and silently skips anything that is not a hex
//! digit; accepted digits are optionally echoed in lower case. Output is
//! always lower case, most significant nibble first.

use crate::error::BridgeError;
use crate::transport::ByteTransport;

const DIGITS: &[u8; 16] = b"0123456789abcdef";

pub fn digit_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

pub fn encode_nibble(nibble: u8) -> u8 {
    DIGITS[(nibble & 0x0F) as usize]
}

pub fn encode_byte(value: u8) -> [u8; 2] {
    [encode_nibble(value >> 4), encode_nibble(value)]
}

pub fn encode_word(value: u16) -> [u8; 4] {
    let [high, low] = value.to_be_bytes();
    let [a, b] = encode_byte(high);
    let [c, d] = encode_byte(low);
    [a, b, c, d]
}

/// Decodes two reply digits sent by the bridge.
pub fn decode_byte(digits: [u8; 2]) -> Result<u8, BridgeError> {
    let high = digit_value(digits[0]).ok_or(BridgeError::InvalidHexDigit(digits[0]))?;
    let low = digit_value(digits[1]).ok_or(BridgeError::InvalidHexDigit(digits[1]))?;
    Ok((high << 4) | low)
}

/// Waits for the next hex digit on `transport`, discarding everything else.
pub fn read_digit<T: ByteTransport + ?Sized>(
    transport: &mut T,
    echo: bool,
) -> Result<u8, BridgeError> {
    loop {
        let byte = transport.receive()?;
        if let Some(value) = digit_value(byte) {
            if echo {
                transport.send(byte.to_ascii_lowercase())?;
                transport.flush()?;
            }
            return Ok(value);
        }
        log::trace!("skipping non-hex input {byte:#04x}");
    }
}

pub fn read_byte<T: ByteTransport + ?Sized>(transport: &mut T, echo: bool) -> Result<u8, BridgeError> {
    let high = read_digit(transport, echo)?;
    let low = read_digit(transport, echo)?;
    Ok((high << 4) | low)
}

pub fn read_word<T: ByteTransport + ?Sized>(transport: &mut T, echo: bool) -> Result<u16, BridgeError> {
    let high = read_byte(transport, echo)?;
    let low = read_byte(transport, echo)?;
    Ok(u16::from_be_bytes([high, low]))
}

pub fn write_byte<T: ByteTransport + ?Sized>(transport: &mut T, value: u8) -> Result<(), BridgeError> {
    transport.send_all(&encode_byte(value))
}
