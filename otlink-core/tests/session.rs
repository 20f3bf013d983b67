//! Session lifecycle against an in-memory UART

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use otlink_core::{
    check_parity, with_parity, MessageId, MessageType, Mode, OpenThermMessage, Session,
    SessionConfig, SessionError,
};
use otlink_hal::{UartRx, UartTx};
use otlink_protocol::{
    encode_stream, encode_to_vec, serialize, CpuStatusRequest, CpuStatusResponse,
    GenericStatusResponse, LogRequest, OtCommandRequest, OtCommandResponse, Packet, TrailerPolicy,
    START_BYTE, STOP_BYTE,
};

#[derive(Default)]
struct Wire {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    /// Bytes already pushed out by a flush
    flushed: usize,
    fail_writes: bool,
    fail_flush: bool,
}

/// UART backed by a wire the test keeps a handle to
#[derive(Clone, Default)]
struct MockUart(Rc<RefCell<Wire>>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WireFault;

impl MockUart {
    fn inject(&self, bytes: &[u8]) {
        self.0.borrow_mut().rx.extend(bytes.iter().copied());
    }

    fn take_tx(&self) -> Vec<u8> {
        let mut wire = self.0.borrow_mut();
        wire.flushed = 0;
        std::mem::take(&mut wire.tx)
    }

    fn unflushed(&self) -> usize {
        let wire = self.0.borrow();
        wire.tx.len() - wire.flushed
    }
}

impl UartTx for MockUart {
    type Error = WireFault;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), WireFault> {
        let mut wire = self.0.borrow_mut();
        if wire.fail_writes {
            return Err(WireFault);
        }
        wire.tx.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), WireFault> {
        let mut wire = self.0.borrow_mut();
        if wire.fail_flush {
            return Err(WireFault);
        }
        wire.flushed = wire.tx.len();
        Ok(())
    }
}

impl UartRx for MockUart {
    type Error = WireFault;

    fn has_data(&mut self) -> bool {
        !self.0.borrow().rx.is_empty()
    }

    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize, WireFault> {
        let mut wire = self.0.borrow_mut();
        let mut n = 0;
        for slot in buf.iter_mut() {
            match wire.rx.pop_front() {
                Some(b) => {
                    *slot = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

fn open(config: SessionConfig) -> (Session<MockUart>, MockUart) {
    let uart = MockUart::default();
    let session = Session::new(uart.clone(), config).unwrap();
    (session, uart)
}

fn response_frame(payload: u32) -> Vec<u8> {
    serialize(&OtCommandResponse {
        payload,
        response_status: 0,
    })
    .unwrap()
    .to_vec()
}

/// Decode the word carried by a transmitted command request frame
fn sent_word(tx: &[u8]) -> u32 {
    assert_eq!(tx.len(), 16);
    assert_eq!((tx[0], tx[1], tx[2], tx[15]), (START_BYTE, 0x00, 0x04, STOP_BYTE));
    let bytes: Vec<u8> = tx[3..11].chunks(2).map(|p| (p[0] << 4) | p[1]).collect();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[test]
fn test_lifecycle() {
    let (mut s, uart) = open(SessionConfig::default());
    assert_eq!(s.mode(), Mode::Idle);
    assert_eq!(s.get_message(), None);

    s.send(&OpenThermMessage::read(MessageId::Status)).unwrap();
    assert_eq!(s.mode(), Mode::Sent);
    assert_eq!(s.poll(), Ok(0));
    assert_eq!(s.get_message(), None);

    uart.inject(&response_frame(0x0000_0005));
    assert_eq!(s.poll(), Ok(1));
    assert_eq!(s.mode(), Mode::Received);

    let msg = s.get_message().unwrap();
    assert_eq!((msg.msg_type, msg.id, msg.value_hb, msg.value_lb), (0, 0, 0, 5));
    assert_eq!(s.get_message(), Some(msg));
    assert_eq!(s.response_status(), Some(0));

    s.stop();
    assert_eq!(s.mode(), Mode::Idle);
    assert_eq!(s.get_message(), None);
    assert_eq!(s.response_status(), None);
}

#[test]
fn test_send_zero_word_unmodified() {
    let (mut s, uart) = open(SessionConfig::default());
    s.send(&OpenThermMessage::default()).unwrap();
    assert_eq!(sent_word(&uart.take_tx()), 0x0000_0000);
}

#[test]
fn test_send_sets_parity_bit() {
    let (mut s, uart) = open(SessionConfig::default());
    let msg = OpenThermMessage::new(MessageType::WriteData, MessageId::ChSetpoint.as_u8(), 0x2900);
    s.send(&msg).unwrap();

    let word = sent_word(&uart.take_tx());
    assert_eq!(word, 0x9001_2900);
    assert!(check_parity(word));
}

#[test]
fn test_response_split_across_polls() {
    let (mut s, uart) = open(SessionConfig::default());
    s.send(&OpenThermMessage::read(MessageId::FeedTemp)).unwrap();

    let reply = OpenThermMessage::new(MessageType::ReadAck, 25, 0x2D80).to_word();
    let frame = response_frame(reply);
    let (head, tail) = frame.split_at(7);

    uart.inject(head);
    assert_eq!(s.poll(), Ok(0));
    assert_eq!(s.mode(), Mode::Sent);

    uart.inject(tail);
    assert_eq!(s.poll(), Ok(1));

    let msg = s.get_message().unwrap();
    assert_eq!(msg.message_type(), MessageType::ReadAck);
    assert_eq!(msg.message_id(), Some(MessageId::FeedTemp));
    assert_eq!(msg.f88(), 45.5);
}

#[test]
fn test_new_send_discards_previous_response() {
    let (mut s, uart) = open(SessionConfig::default());
    s.send(&OpenThermMessage::read(MessageId::Status)).unwrap();
    uart.inject(&response_frame(0x0000_0005));
    s.poll().unwrap();
    assert!(s.get_message().is_some());

    s.send(&OpenThermMessage::read(MessageId::Status)).unwrap();
    assert_eq!(s.mode(), Mode::Sent);
    assert_eq!(s.get_message(), None);
}

#[test]
fn test_garbage_and_auxiliary_packets() {
    let (mut s, uart) = open(SessionConfig::default());
    uart.inject(&[0x00, 0x13, STOP_BYTE, 0xFF]);
    uart.inject(
        &serialize(&GenericStatusResponse {
            boiler_status: 0x0A,
            ext_temp: -3.25,
            light_value: 512,
        })
        .unwrap(),
    );
    uart.inject(
        &serialize(&CpuStatusResponse {
            cpu_version: 1,
            firmware_version: 4,
            board_revision: 2,
            uptime: 90,
        })
        .unwrap(),
    );
    uart.inject(&serialize(&LogRequest::from_text(b"ot bus ok")).unwrap());

    assert_eq!(s.poll(), Ok(3));
    assert_eq!(s.generic_status().map(|g| g.ext_temp), Some(-3.25));
    assert_eq!(s.cpu_status().map(|c| c.uptime), Some(90));
    assert_eq!(s.last_log().map(|l| l.text()), Some(&b"ot bus ok"[..]));
    // Auxiliary packets leave the OpenTherm exchange alone
    assert_eq!(s.mode(), Mode::Idle);
    assert_eq!(s.frame_stats().dispatched, 3);
}

#[test]
fn test_stream_bytes_are_queued() {
    let (mut s, uart) = open(SessionConfig::default());
    let mut buffer = [0u8; 32];
    let len = encode_stream(b"trace", &mut buffer).unwrap();
    uart.inject(&buffer[..len]);

    assert_eq!(s.poll(), Ok(0));

    let mut out = [0u8; 3];
    assert_eq!(s.read_stream(&mut out), 3);
    assert_eq!(&out, b"tra");
    assert_eq!(s.read_stream(&mut out), 2);
    assert_eq!(&out[..2], b"ce");
    assert_eq!(s.read_stream(&mut out), 0);
}

#[test]
fn test_dropped_frames_are_counted() {
    let (mut s, uart) = open(SessionConfig::default());
    // Type 9 is not registered
    uart.inject(&[START_BYTE, 0x00, 0x09, 0x00, 0x01, 0, 0, 0, 0, STOP_BYTE]);

    assert_eq!(s.poll(), Ok(0));
    assert_eq!(s.frame_stats().unknown_types, 1);
    assert_eq!(s.frame_stats().dropped(), 1);
}

#[test]
fn test_timeout_is_opt_in() {
    let (mut s, _uart) = open(SessionConfig::default());
    s.send(&OpenThermMessage::read(MessageId::Status)).unwrap();
    assert_eq!(s.tick(60_000), Mode::Sent);

    let (mut s, _uart) = open(SessionConfig {
        response_timeout_ms: Some(800),
        ..SessionConfig::default()
    });
    s.send(&OpenThermMessage::read(MessageId::Status)).unwrap();
    assert_eq!(s.tick(500), Mode::Sent);
    assert_eq!(s.tick(300), Mode::ErrorTimeout);
    assert_eq!(s.get_message(), None);

    s.stop();
    assert_eq!(s.mode(), Mode::Idle);
    assert_eq!(s.tick(10_000), Mode::Idle);
}

#[test]
fn test_send_restarts_deadline() {
    let (mut s, _uart) = open(SessionConfig {
        response_timeout_ms: Some(800),
        ..SessionConfig::default()
    });
    s.send(&OpenThermMessage::read(MessageId::Status)).unwrap();
    s.tick(700);
    s.send(&OpenThermMessage::read(MessageId::Status)).unwrap();
    assert_eq!(s.tick(700), Mode::Sent);
}

#[test]
fn test_parity_verification() {
    let (mut s, uart) = open(SessionConfig {
        verify_response_parity: true,
        ..SessionConfig::default()
    });
    s.send(&OpenThermMessage::read(MessageId::Status)).unwrap();
    uart.inject(&response_frame(0x0000_0001));
    assert_eq!(s.poll(), Ok(1));
    assert_eq!(s.mode(), Mode::ErrorProtocol);
    assert_eq!(s.get_message(), None);

    // Without verification the same word is accepted as-is
    let (mut s, uart) = open(SessionConfig::default());
    s.send(&OpenThermMessage::read(MessageId::Status)).unwrap();
    uart.inject(&response_frame(0x0000_0001));
    assert_eq!(s.poll(), Ok(1));
    assert_eq!(s.get_message().map(|m| m.value_lb), Some(1));
}

#[test]
fn test_strict_config_uses_crc_both_ways() {
    let (mut s, uart) = open(SessionConfig::strict());
    s.send(&OpenThermMessage::read(MessageId::Status)).unwrap();

    let expected = encode_to_vec(
        &OtCommandRequest {
            payload: OpenThermMessage::read(MessageId::Status).to_word(),
        },
        TrailerPolicy::Crc16,
    )
    .unwrap();
    assert_eq!(&uart.take_tx()[..], &expected[..]);

    let resp = OtCommandResponse {
        payload: with_parity(0x4000_0005),
        response_status: 0,
    };
    uart.inject(&serialize(&resp).unwrap());
    uart.inject(&encode_to_vec(&resp, TrailerPolicy::Crc16).unwrap());

    // The zero trailer is rejected, the checksummed copy goes through
    assert_eq!(s.poll(), Ok(1));
    assert_eq!(s.frame_stats().checksum_mismatches, 1);
    assert_eq!(s.mode(), Mode::Received);
    assert_eq!(s.get_message().map(|m| m.value_lb), Some(5));
}

#[test]
fn test_request_cpu_status() {
    let (mut s, uart) = open(SessionConfig::default());
    s.request_cpu_status().unwrap();
    assert_eq!(s.mode(), Mode::Idle);

    let tx = uart.take_tx();
    assert_eq!(tx.len(), 2 * CpuStatusRequest::SIZE + 8);
    assert_eq!(&tx[..3], &[START_BYTE, 0x00, 0x01]);
}

#[test]
fn test_transport_error_keeps_mode() {
    let (mut s, uart) = open(SessionConfig::default());
    uart.0.borrow_mut().fail_writes = true;

    assert_eq!(
        s.send(&OpenThermMessage::read(MessageId::Status)),
        Err(SessionError::Transport(WireFault))
    );
    assert_eq!(s.mode(), Mode::Idle);
}

#[test]
fn test_requests_are_flushed() {
    let (mut s, uart) = open(SessionConfig::default());
    s.send(&OpenThermMessage::read(MessageId::Status)).unwrap();
    assert_eq!(uart.unflushed(), 0);

    s.request_cpu_status().unwrap();
    assert_eq!(uart.unflushed(), 0);
    assert_eq!(uart.take_tx().len(), 16 + 10);
}

#[test]
fn test_flush_error_is_reported() {
    let (mut s, uart) = open(SessionConfig::default());
    uart.0.borrow_mut().fail_flush = true;

    assert_eq!(
        s.send(&OpenThermMessage::read(MessageId::Status)),
        Err(SessionError::Transport(WireFault))
    );
    assert_eq!(s.mode(), Mode::Idle);
}

#[test]
fn test_late_response_keeps_timeout() {
    let (mut s, uart) = open(SessionConfig {
        response_timeout_ms: Some(800),
        ..SessionConfig::default()
    });
    s.send(&OpenThermMessage::read(MessageId::Status)).unwrap();
    assert_eq!(s.tick(800), Mode::ErrorTimeout);

    uart.inject(&response_frame(0x0000_0005));
    assert_eq!(s.poll(), Ok(1));
    assert_eq!(s.mode(), Mode::ErrorTimeout);
    assert_eq!(s.get_message(), None);

    // Only stop() leaves the error; the next exchange works normally
    s.stop();
    s.send(&OpenThermMessage::read(MessageId::Status)).unwrap();
    uart.inject(&response_frame(0x0000_0005));
    assert_eq!(s.poll(), Ok(1));
    assert_eq!(s.get_message().map(|m| m.value_lb), Some(5));
}

#[test]
fn test_good_word_after_bad_parity_keeps_error() {
    let (mut s, uart) = open(SessionConfig {
        verify_response_parity: true,
        ..SessionConfig::default()
    });
    s.send(&OpenThermMessage::read(MessageId::Status)).unwrap();
    uart.inject(&response_frame(0x0000_0001));
    uart.inject(&response_frame(0x0000_0003));

    assert_eq!(s.poll(), Ok(2));
    assert_eq!(s.mode(), Mode::ErrorProtocol);
    assert_eq!(s.get_message(), None);
}

#[test]
fn test_unsolicited_response_still_received() {
    let (mut s, uart) = open(SessionConfig::default());
    uart.inject(&response_frame(0x0000_0005));

    assert_eq!(s.poll(), Ok(1));
    assert_eq!(s.mode(), Mode::Received);
}
