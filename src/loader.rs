//! # Program Loader
//!
//! Parses Intel HEX images and uploads them through a [`BridgeClient`] in
//! fixed-size chunks. Every chunk goes out as one block load; the bytes the
//! bridge reads back are compared with what was sent and the chunk is
//! repeated until they match or the retry budget runs out.

use std::collections::BTreeMap;
use std::path::Path;

use ihex::Record;

use crate::client::BridgeClient;
use crate::config::LoaderConfig;
use crate::error::BridgeError;
use crate::transport::ByteTransport;
use crate::types::Address;

/// A contiguous run of bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub start: Address,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexImage {
    segments: Vec<Segment>,
    /// Start address from a type 03 or 05 record, if present.
    entry: Option<u32>,
}

impl HexImage {
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        let mut bytes: BTreeMap<u16, u8> = BTreeMap::new();
        let mut base: u32 = 0;
        let mut entry = None;

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let record = raw.trim();
            if record.is_empty() {
                continue;
            }
            let fail = |reason: String| BridgeError::HexRecord { line, reason };

            match Record::from_record_string(record).map_err(|e| fail(e.to_string()))? {
                Record::Data { offset, value } => {
                    for (i, byte) in value.into_iter().enumerate() {
                        let address = base + u32::from(offset) + i as u32;
                        let address = u16::try_from(address)
                            .map_err(|_| fail("data beyond the 16-bit address range".into()))?;
                        bytes.insert(address, byte);
                    }
                }
                Record::EndOfFile => break,
                Record::ExtendedSegmentAddress(segment) => base = u32::from(segment) << 4,
                Record::ExtendedLinearAddress(upper) => base = u32::from(upper) << 16,
                Record::StartSegmentAddress { cs, ip } => {
                    entry = Some((u32::from(cs) << 16) | u32::from(ip))
                }
                Record::StartLinearAddress(address) => entry = Some(address),
            }
        }

        Ok(HexImage {
            segments: merge_segments(&bytes),
            entry,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| BridgeError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn entry(&self) -> Option<u32> {
        self.entry
    }

    /// Total number of data bytes.
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.data.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

fn merge_segments(bytes: &BTreeMap<u16, u8>) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut next: Option<u32> = None;
    for (&address, &byte) in bytes {
        match segments.last_mut() {
            Some(segment) if next == Some(address as u32) => segment.data.push(byte),
            _ => segments.push(Segment {
                start: Address::new(address),
                data: vec![byte],
            }),
        }
        next = Some(address as u32 + 1);
    }
    segments
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub chunks: usize,
    pub bytes: usize,
    pub retries: u32,
}

#[derive(Debug, Clone)]
pub struct Loader {
    chunk_size: usize,
    max_retries: Option<u32>,
}

impl Default for Loader {
    fn default() -> Self {
        Loader::new(&LoaderConfig::default())
    }
}

impl Loader {
    pub fn new(config: &LoaderConfig) -> Self {
        Loader {
            chunk_size: config.chunk_size.clamp(1, u16::MAX as usize),
            max_retries: config.max_retries,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn load<T: ByteTransport>(
        &self,
        client: &mut BridgeClient<T>,
        image: &HexImage,
    ) -> Result<LoadReport, BridgeError> {
        let mut report = LoadReport::default();
        for segment in image.segments() {
            let mut address = segment.start;
            for chunk in segment.data.chunks(self.chunk_size) {
                log::info!("writing {} bytes at {address}", chunk.len());
                report.retries += self.load_chunk(client, address, chunk)?;
                report.chunks += 1;
                report.bytes += chunk.len();
                address = address.wrapping_add(chunk.len() as u16);
            }
        }
        log::info!(
            "loaded {} bytes in {} chunks, {} retries",
            report.bytes,
            report.chunks,
            report.retries
        );
        Ok(report)
    }

    /// Uploads one chunk until it verifies. Returns the number of retries.
    fn load_chunk<T: ByteTransport>(
        &self,
        client: &mut BridgeClient<T>,
        address: Address,
        chunk: &[u8],
    ) -> Result<u32, BridgeError> {
        let mut retries = 0;
        loop {
            match client.load_block(address, chunk) {
                Ok(verify) if verify == chunk => return Ok(retries),
                Ok(_) => log::warn!("verification error at {address}, retrying"),
                Err(err) if err.is_recoverable() || matches!(err, BridgeError::Nak) => {
                    log::warn!("block load at {address} failed: {err}, retrying")
                }
                Err(err) => return Err(err),
            }
            retries += 1;
            if self.max_retries.is_some_and(|max| retries > max) {
                return Err(BridgeError::VerifyFailed {
                    address,
                    attempts: retries,
                });
            }
        }
    }
}
