//! Block transfer: sequential write pass followed by a read-back pass over the
//! same range. Mismatches are for the caller to spot; nothing is compared here.

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::hardware::BusPort;
use crate::transport::ByteTransport;
use crate::types::Address;

impl<P: BusPort> Bridge<P> {
    /// Writes `size` raw bytes taken from `transport` starting at `start`,
    /// then reads the same range back and sends every byte to `transport`.
    /// Addresses wrap at the top of the 16-bit range.
    ///
    /// If the payload stalls or a write cycle fails, the rest of the payload
    /// is still consumed so the byte stream stays aligned for the next
    /// command.
    pub fn load_block<T: ByteTransport + ?Sized>(
        &mut self,
        start: Address,
        size: u16,
        transport: &mut T,
    ) -> Result<(), BridgeError> {
        log::debug!("block load of {size} bytes at {start}");

        let mut address = start;
        for written in 0..size {
            let outcome = match transport.receive() {
                Ok(value) => self
                    .write_byte(address, value)
                    .map_err(|err| (err, size - written - 1)),
                Err(BridgeError::InputTimeout) => Err((BridgeError::InputTimeout, size - written)),
                Err(err) => return Err(err),
            };
            if let Err((err, remaining)) = outcome {
                log::warn!("block write failed at {address}: {err}, skipping {remaining} payload bytes");
                skip_payload(transport, remaining)?;
                return Err(err);
            }
            address.inc();
        }

        let mut address = start;
        for _ in 0..size {
            let value = self.read_byte(address)?;
            transport.send(value)?;
            address.inc();
        }
        transport.flush()
    }
}

/// Discards `count` payload bytes. Only the count ends the payload; idle
/// timeouts in between are waited out.
fn skip_payload<T: ByteTransport + ?Sized>(transport: &mut T, count: u16) -> Result<(), BridgeError> {
    let mut skipped = 0;
    while skipped < count {
        match transport.receive() {
            Ok(_) => skipped += 1,
            Err(BridgeError::InputTimeout) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
