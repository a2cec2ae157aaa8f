//! # Simulated Board
//!
//! A pin-level model of everything behind the microcontroller's ports: the
//! 74AC138 select demultiplexer, the four far-end latches, the shared
//! conductor group and a target system that owns the bus until it answers a
//! request. `SimulatedBoard` implements [`Registers`], so the bridge drives
//! it through exactly the same `RegisterPort` code as real hardware.
//!
//! Time is virtual: it only advances through `Registers::delay`. Every
//! observable step is appended to a trace of [`TraceEvent`]s.

mod latch;
mod target;
mod trace;

pub use latch::LatchBank;
pub use target::TargetSystem;
pub use trace::TraceEvent;

use std::time::Duration;

use crate::bridge::{Bridge, Timing};
use crate::bus::SignalGroup;
use crate::config::{BridgeConfig, TargetConfig};
use crate::encoding::{SelectCode, BUSACK_BIT, SELECT_OUTPUTS, STROBE_BIT};
use crate::hardware::{Register, RegisterPort, Registers};
use crate::pin::DriveStrength;

const BRIDGE: &str = "BRIDGE";
const PULLUP: &str = "PULLUP";
const TARGET: &str = "TARGET";
const DATA_LATCH: &str = "DATA_LATCH";

pub type SimulatedBridge = Bridge<RegisterPort<SimulatedBoard>>;

/// Builds a bridge wired to a fresh simulated board.
pub fn simulated_bridge(config: &BridgeConfig) -> SimulatedBridge {
    let board = SimulatedBoard::new(&config.target);
    Bridge::new(RegisterPort::new(board), Timing::from(&config.timing))
}

#[derive(Debug, Clone)]
pub struct SimulatedBoard {
    port_b: u8,
    ddr_b: u8,
    port_d: u8,
    ddr_d: u8,
    conductors: SignalGroup,
    latches: LatchBank,
    target: TargetSystem,
    select: SelectCode,
    select_since: Duration,
    strobe_since: Option<Duration>,
    contention: u8,
    clock: Duration,
    trace: Vec<TraceEvent>,
}

impl SimulatedBoard {
    /// Power-on state: every port pin is an input.
    pub fn new(config: &TargetConfig) -> Self {
        let mut board = SimulatedBoard {
            port_b: 0,
            ddr_b: 0,
            port_d: 0,
            ddr_d: 0,
            conductors: SignalGroup::new("DATA".to_string()),
            latches: LatchBank::default(),
            target: TargetSystem::new(config),
            select: SelectCode::Idle,
            select_since: Duration::ZERO,
            strobe_since: None,
            contention: 0,
            clock: Duration::ZERO,
            trace: Vec::new(),
        };
        board.refresh_bridge_drive();
        board
    }

    pub fn target(&self) -> &TargetSystem {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut TargetSystem {
        &mut self.target
    }

    pub fn latches(&self) -> &LatchBank {
        &self.latches
    }

    /// Select code the demultiplexer currently decodes.
    pub fn select(&self) -> SelectCode {
        self.select
    }

    pub fn data_lines(&self) -> &SignalGroup {
        &self.conductors
    }

    pub fn is_strobe_active(&self) -> bool {
        self.ddr_d & STROBE_BIT != 0 && self.port_d & STROBE_BIT == 0
    }

    pub fn elapsed(&self) -> Duration {
        self.clock
    }

    pub fn trace(&self) -> &[TraceEvent] {
        &self.trace
    }

    pub fn take_trace(&mut self) -> Vec<TraceEvent> {
        std::mem::take(&mut self.trace)
    }

    fn record(&mut self, event: TraceEvent) {
        log::trace!("sim: {event}");
        self.trace.push(event);
    }

    /// Undriven select pins read high through the board pull-ups.
    fn decoded_select(&self) -> SelectCode {
        let lines = ((self.port_d & self.ddr_d) | !self.ddr_d) & SELECT_OUTPUTS;
        // 011 has no consumer on the board
        SelectCode::from_port_value(lines).unwrap_or(SelectCode::Idle)
    }

    fn port_d_changed(&mut self) {
        self.update_strobe();
        self.update_select();
    }

    fn update_strobe(&mut self) {
        let active = self.is_strobe_active();
        let granted = self.target.is_granted();
        match (self.strobe_since, active) {
            (None, true) => {
                self.strobe_since = Some(self.clock);
                self.record(TraceEvent::StrobeAsserted { granted });
            }
            (Some(since), false) => {
                self.strobe_since = None;
                self.record(TraceEvent::StrobeReleased {
                    width: self.clock - since,
                    granted,
                });
                if granted {
                    self.commit_write();
                }
            }
            _ => {}
        }
    }

    fn commit_write(&mut self) {
        let Some(word) = self.latches.control_word() else {
            return;
        };
        if !word.is_write() {
            return;
        }
        let space = word.space();
        let address = self.latches.address();
        let value = self.latches.data;
        self.target.poke(space, address, value);
        self.record(TraceEvent::TargetWrite {
            space,
            address,
            value,
        });
    }

    fn update_select(&mut self) {
        let next = self.decoded_select();
        if next == self.select {
            return;
        }
        let previous = self.select;
        self.leave_select(previous);
        self.select = next;
        self.select_since = self.clock;
        self.enter_select(next);
    }

    fn leave_select(&mut self, code: SelectCode) {
        if code.is_latch() {
            // The 74xx574 clocks on the rising edge of the decoder output
            let value = self.conductors.read_byte();
            self.latches.capture(code, value);
            self.record(TraceEvent::Latched {
                code,
                value,
                held: self.clock - self.select_since,
            });
            return;
        }
        match code {
            SelectCode::RequestBus => {
                let was_granted = self.target.release();
                self.conductors.release(TARGET);
                self.conductors.release(DATA_LATCH);
                self.record(if was_granted {
                    TraceEvent::BusReleased
                } else {
                    TraceEvent::RequestWithdrawn
                });
            }
            SelectCode::ResetTarget => {
                self.target.reset();
                self.record(TraceEvent::TargetReset);
            }
            _ => {}
        }
    }

    fn enter_select(&mut self, code: SelectCode) {
        if code == SelectCode::RequestBus {
            self.target.request();
            self.record(TraceEvent::BusRequested);
        }
    }

    fn poll_acknowledge(&mut self) -> bool {
        let was_granted = self.target.is_granted();
        let granted = self.target.poll();
        if granted && !was_granted {
            let polls = self.target.polls_waited();
            self.record(TraceEvent::BusGranted { polls });
            self.drive_granted_cycle();
        }
        granted
    }

    /// Once granted, the latches own the target's address and control lines.
    /// A read cycle puts the addressed byte on the conductors; a write cycle
    /// puts the data latch there.
    fn drive_granted_cycle(&mut self) {
        let Some(word) = self.latches.control_word() else {
            log::warn!(
                "sim: bus granted with invalid control word {:08b}",
                self.latches.control
            );
            return;
        };
        let space = word.space();
        let address = self.latches.address();
        if word.is_read() {
            let value = self.target.peek(space, address);
            self.record(TraceEvent::TargetRead {
                space,
                address,
                value,
            });
            self.conductors
                .drive_byte(TARGET, value, DriveStrength::Standard);
        } else {
            self.conductors
                .drive_byte(DATA_LATCH, self.latches.data, DriveStrength::Standard);
        }
        self.check_contention();
    }

    fn refresh_bridge_drive(&mut self) {
        let outputs = self.ddr_b;
        let pulled_up = !self.ddr_b & self.port_b;
        self.conductors
            .drive_bits(BRIDGE, self.port_b, outputs, DriveStrength::Standard);
        self.conductors.release_bits(BRIDGE, !outputs);
        self.conductors
            .drive_bits(PULLUP, 0xFF, pulled_up, DriveStrength::Weak);
        self.conductors.release_bits(PULLUP, !pulled_up);
        self.check_contention();
    }

    fn check_contention(&mut self) {
        let mask = self.conductors.contention_mask();
        if mask != 0 && mask != self.contention {
            if let Err(message) = self.conductors.check_contention() {
                log::warn!("sim: {message}");
            }
            self.record(TraceEvent::Contention { mask });
        }
        self.contention = mask;
    }

    fn pin_d(&self) -> u8 {
        let lines = (self.port_d & self.ddr_d) | !self.ddr_d;
        if self.target.is_granted() {
            lines & !BUSACK_BIT
        } else {
            lines | BUSACK_BIT
        }
    }
}

impl Registers for SimulatedBoard {
    fn write(&mut self, register: Register, value: u8) {
        match register {
            Register::PortB => {
                self.port_b = value;
                self.refresh_bridge_drive();
            }
            Register::DdrB => {
                self.ddr_b = value;
                self.refresh_bridge_drive();
            }
            Register::PortD => {
                self.port_d = value;
                self.port_d_changed();
            }
            Register::DdrD => {
                // BUSACK stays an input whatever is written
                self.ddr_d = value & !BUSACK_BIT;
                self.port_d_changed();
            }
            Register::PinB | Register::PinD => {
                log::warn!("sim: write to input register {register:?} ignored");
            }
        }
    }

    fn read(&mut self, register: Register) -> u8 {
        match register {
            Register::PinB => {
                let value = self.conductors.read_byte();
                let granted = self.target.is_granted();
                self.record(TraceEvent::Sampled { value, granted });
                value
            }
            Register::PinD => {
                self.poll_acknowledge();
                self.pin_d()
            }
            Register::PortB => self.port_b,
            Register::DdrB => self.ddr_b,
            Register::PortD => self.port_d,
            Register::DdrD => self.ddr_d,
        }
    }

    fn delay(&mut self, duration: Duration) {
        self.clock += duration;
    }
}
