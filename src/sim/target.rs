use crate::config::TargetConfig;
use crate::types::{Address, AddressSpace};

const SPACE_SIZE: usize = 0x1_0000;

/// The system on the far side of the bus: memory, I/O space, and a bus
/// owner that answers BUSRQ after a configurable number of polls.
#[derive(Debug, Clone)]
pub struct TargetSystem {
    memory: Vec<u8>,
    io: Vec<u8>,
    ack_latency_polls: u32,
    responsive: bool,
    requested: bool,
    granted: bool,
    polls_waited: u32,
    resets: u32,
}

impl TargetSystem {
    pub fn new(config: &TargetConfig) -> Self {
        let mut target = TargetSystem {
            memory: vec![config.fill; SPACE_SIZE],
            io: vec![config.fill; SPACE_SIZE],
            ack_latency_polls: config.ack_latency_polls,
            responsive: config.responsive,
            requested: false,
            granted: false,
            polls_waited: 0,
            resets: 0,
        };
        for region in &config.preload {
            target.load(region.space, Address::new(region.address), &region.data);
        }
        target
    }

    pub fn peek(&self, space: AddressSpace, address: Address) -> u8 {
        self.space(space)[address.value() as usize]
    }

    pub fn poke(&mut self, space: AddressSpace, address: Address, value: u8) {
        self.space_mut(space)[address.value() as usize] = value;
    }

    /// Copies `data` in starting at `start`, wrapping at the top of the space.
    pub fn load(&mut self, space: AddressSpace, start: Address, data: &[u8]) {
        let mut address = start;
        for &byte in data {
            self.poke(space, address, byte);
            address.inc();
        }
    }

    pub fn set_responsive(&mut self, responsive: bool) {
        self.responsive = responsive;
    }

    pub fn set_ack_latency(&mut self, polls: u32) {
        self.ack_latency_polls = polls;
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }

    pub fn is_granted(&self) -> bool {
        self.granted
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }

    pub(crate) fn request(&mut self) {
        self.requested = true;
        self.granted = false;
        self.polls_waited = 0;
    }

    /// One look at BUSACK. Returns true once the bus has been handed over.
    pub(crate) fn poll(&mut self) -> bool {
        if self.requested && !self.granted {
            if self.responsive && self.polls_waited >= self.ack_latency_polls {
                self.granted = true;
            }
            self.polls_waited += 1;
        }
        self.granted
    }

    pub(crate) fn polls_waited(&self) -> u32 {
        self.polls_waited
    }

    /// Drops the request. Returns whether the bus had been granted.
    pub(crate) fn release(&mut self) -> bool {
        let was_granted = self.granted;
        self.requested = false;
        self.granted = false;
        was_granted
    }

    pub(crate) fn reset(&mut self) {
        self.resets += 1;
    }

    fn space(&self, space: AddressSpace) -> &[u8] {
        match space {
            AddressSpace::Memory => &self.memory,
            AddressSpace::Io => &self.io,
        }
    }

    fn space_mut(&mut self, space: AddressSpace) -> &mut [u8] {
        match space {
            AddressSpace::Memory => &mut self.memory,
            AddressSpace::Io => &mut self.io,
        }
    }
}
