//! Command protocol scenarios run against the simulated board


use mocks::*;
use rusty_bridge::protocol::{Command, NAK};
use rusty_bridge::sim::TraceEvent;
use rusty_bridge::transport::{ScriptedTransport, StreamTransport};
use rusty_bridge::{Address, AddressSpace};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, LineWriter, Read, Write};
use std::rc::Rc;

#[test]
fn test_write_scenario_with_echo() {
    let mut server = sim_server(true);
    let mut transport = ScriptedTransport::new(b"w00ff2a");
    server.serve(&mut transport).unwrap();

    assert_eq!(transport.output(), b"W00ff2a");
    let board = server.bridge().port().registers();
    assert_eq!(board.target().peek(AddressSpace::Memory, Address::new(0x00FF)), 0x2A);
}

#[test]
fn test_write_scenario_reply_is_single_ack() {
    let mut server = sim_server(false);
    let mut transport = ScriptedTransport::new(b"w00ff2a");
    server.serve(&mut transport).unwrap();

    assert_eq!(transport.output(), b"W");
    let board = server.bridge().port().registers();
    assert_eq!(board.target().peek(AddressSpace::Memory, Address::new(0x00FF)), 0x2A);
    assert_eq!(server.commands_handled(), 1);
}

#[test]
fn test_block_scenario() {
    let mut server = sim_server(false);
    let mut transport = ScriptedTransport::new(b"b00100003");
    transport.push_input([0xAAu8, 0xBB, 0xCC]);
    server.serve(&mut transport).unwrap();

    assert_eq!(transport.output(), &[b'B', 0xAA, 0xBB, 0xCC]);
    let board = server.bridge().port().registers();
    let writes: Vec<(Address, u8)> = board
        .trace()
        .iter()
        .filter_map(|e| match e {
            TraceEvent::TargetWrite { address, value, .. } => Some((*address, *value)),
            _ => None,
        })
        .collect();
    assert_eq!(
        writes,
        vec![
            (Address::new(0x0010), 0xAA),
            (Address::new(0x0011), 0xBB),
            (Address::new(0x0012), 0xCC),
        ]
    );
}

#[test]
fn test_block_scenario_with_echo() {
    let mut server = sim_server(true);
    let mut transport = ScriptedTransport::new(b"B00100003");
    transport.push_input([0xAAu8, 0xBB, 0xCC]);
    server.serve(&mut transport).unwrap();

    let mut expected = b"B00100003".to_vec();
    expected.extend([0xAA, 0xBB, 0xCC]);
    assert_eq!(transport.output(), expected.as_slice());
}

#[test]
fn test_non_hex_bytes_inside_arguments_are_skipped() {
    let mut server = sim_server(false);
    let mut transport = ScriptedTransport::new(b"w 00-10 g4g2");
    server.serve(&mut transport).unwrap();

    let board = server.bridge().port().registers();
    assert_eq!(board.target().peek(AddressSpace::Memory, Address::new(0x0010)), 0x42);
}

#[test]
fn test_unknown_commands_are_ignored_and_loop_continues() {
    let mut server = sim_server(false);
    server
        .bridge_mut()
        .port_mut()
        .registers_mut()
        .target_mut()
        .poke(AddressSpace::Memory, Address::new(0x1234), 0x5E);
    let mut transport = ScriptedTransport::new(b"xyz?a\nR1234");
    server.serve(&mut transport).unwrap();

    assert_eq!(transport.output(), b"R5e");
    assert_eq!(server.commands_handled(), 1);
}

#[test]
fn test_step_reports_each_command() {
    let mut server = sim_server(false);
    let mut transport = ScriptedTransport::new(b"qr0000W000000");
    assert_eq!(server.step(&mut transport).unwrap(), None);
    assert_eq!(server.step(&mut transport).unwrap(), Some(Command::ReadByte));
    assert_eq!(server.step(&mut transport).unwrap(), Some(Command::WriteByte));
    assert!(server.step(&mut transport).is_err());
}

#[test]
fn test_bus_timeout_is_nakked_and_recovers() {
    let mut server = sim_server(false);
    let target = server.bridge_mut().port_mut().registers_mut().target_mut();
    target.set_responsive(false);

    let mut transport = ScriptedTransport::new(b"r0000");
    server.step(&mut transport).unwrap();
    assert_eq!(transport.take_output(), vec![b'R', NAK]);

    server
        .bridge_mut()
        .port_mut()
        .registers_mut()
        .target_mut()
        .set_responsive(true);
    transport.push_input(b"r0000");
    server.step(&mut transport).unwrap();
    assert_eq!(transport.take_output(), b"R00");
    assert_eq!(server.naks_sent(), 1);
    assert_eq!(server.bridge().stats().timeouts, 1);
}

#[test]
fn test_failed_block_consumes_payload_before_nak() {
    let mut server = sim_server(false);
    server
        .bridge_mut()
        .port_mut()
        .registers_mut()
        .target_mut()
        .set_responsive(false);

    let mut transport = ScriptedTransport::new(b"b00200004");
    // Payload bytes that look like commands must not be executed
    transport.push_input(b"rrrr");
    transport.push_input(b"x");
    server.serve(&mut transport).unwrap();

    assert_eq!(transport.output(), &[b'B', NAK]);
    assert_eq!(server.commands_handled(), 1);
    let board = server.bridge().port().registers();
    let cycles = split_cycles(board.trace());
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].last(), Some(&TraceEvent::RequestWithdrawn));
}

#[test]
fn test_input_timeout_inside_payload_is_nakked() {
    let mut server = sim_server(false);
    let mut transport = ScriptedTransport::new(b"b00000002");
    transport.push_input([0x01u8]);
    transport.push_timeout();
    transport.push_input([0x02u8]);
    server.step(&mut transport).unwrap();
    assert_eq!(transport.output(), &[b'B', NAK]);
    assert_eq!(transport.remaining_input(), 0);
}

#[test]
fn test_late_payload_after_timeout_is_not_executed() {
    let mut server = sim_server(false);
    let mut transport = ScriptedTransport::new(b"b00000008");
    transport.push_input([0x01u8]);
    transport.push_timeout();
    transport.push_input(b"w00");
    transport.push_timeout();
    transport.push_input(b"102a");
    transport.push_input(b"r0010");
    server.serve(&mut transport).unwrap();

    assert_eq!(transport.output(), b"B!R00");
    assert_eq!(server.commands_handled(), 2);
    let board = server.bridge().port().registers();
    assert_eq!(board.target().peek(AddressSpace::Memory, Address::new(0x0010)), 0x00);
}

/// Writer that records everything handed to it, observable while a command
/// is still in flight.
#[derive(Clone, Default)]
struct SharedSink(Rc<RefCell<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reader that notes what the host has already seen each time it is asked
/// for another byte.
struct WatchingReader {
    input: VecDeque<u8>,
    sink: SharedSink,
    seen: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl Read for WatchingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.seen.borrow_mut().push(self.sink.0.borrow().clone());
        match self.input.pop_front() {
            Some(byte) if !buf.is_empty() => {
                buf[0] = byte;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

#[test]
fn test_ack_and_echo_leave_a_line_buffered_writer_immediately() {
    let sink = SharedSink::default();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let reader = WatchingReader {
        input: b"r0010".iter().copied().collect(),
        sink: sink.clone(),
        seen: Rc::clone(&seen),
    };
    let mut transport = StreamTransport::new(reader, LineWriter::new(sink.clone()));
    let mut server = sim_server(true);

    assert_eq!(server.step(&mut transport).unwrap(), Some(Command::ReadByte));

    let seen = seen.borrow();
    assert_eq!(seen[0], b"");
    assert_eq!(seen[1], b"R");
    assert_eq!(seen[2], b"R0");
    assert_eq!(seen[4], b"R001");
    assert_eq!(sink.0.borrow().as_slice(), b"R001000");
}
