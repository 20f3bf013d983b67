//! OpenTherm session over the co-processor link
//!
//! One request is in flight at a time:
//!
//! ```text
//!          send()                 response frame
//!   IDLE ──────────► SENT ───────────────────────► RECEIVED
//!    ▲                 │  deadline (opt-in)            │
//!    │                 ├──────────► ERROR_TIMEOUT      │
//!    │                 │  bad parity (opt-in)          │
//!    │                 └──────────► ERROR_PROTOCOL     │
//!    └──────────────────────── stop() ◄────────────────┘
//! ```
//!
//! Everything is driven from [`Session::poll`]; nothing blocks.

use heapless::Deque;

use otlink_hal::{Uart, UartRx, UartTx};
use otlink_protocol::{
    encode_to_vec, CpuStatusRequest, CpuStatusResponse, FrameError, FrameEvents, FrameStats,
    FramingEngine, GenericStatusResponse, LogRequest, OtCommandRequest, OtCommandResponse,
    Packet, PacketHandler, PacketRegistry, RegistryError, TrailerPolicy,
};

use crate::config::SessionConfig;
use crate::message::{check_parity, OpenThermMessage};

/// Streamed bytes kept until the caller drains them
pub const STREAM_QUEUE_SIZE: usize = 128;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    #[default]
    Idle,
    /// Request written, waiting for the boiler's answer
    Sent,
    /// Response stored, readable through `get_message`
    Received,
    /// Response failed the parity check
    ErrorProtocol,
    /// No response before the configured deadline
    ErrorTimeout,
}

impl Mode {
    pub fn is_error(&self) -> bool {
        matches!(self, Mode::ErrorProtocol | Mode::ErrorTimeout)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Idle => "IDLE",
            Mode::Sent => "SENT",
            Mode::Received => "RECEIVED",
            Mode::ErrorProtocol => "ERROR_PROTOCOL",
            Mode::ErrorTimeout => "ERROR_TIMEOUT",
        }
    }
}

/// Errors that can occur while talking to the co-processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError<E> {
    /// The UART reported an error
    Transport(E),
    /// The request could not be framed
    Encode(FrameError),
}

impl<E> From<FrameError> for SessionError<E> {
    fn from(e: FrameError) -> Self {
        SessionError::Encode(e)
    }
}

/// Receive-side state updated by the framing engine's handlers
#[derive(Debug, Default)]
pub struct Inbox {
    mode: Mode,
    data: u32,
    response_status: u8,
    verify_parity: bool,
    generic_status: Option<GenericStatusResponse>,
    cpu_status: Option<CpuStatusResponse>,
    last_log: Option<LogRequest>,
    stream: Deque<u8, STREAM_QUEUE_SIZE>,
}

impl Inbox {
    fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            debug!("session {} -> {}", self.mode.as_str(), mode.as_str());
            self.mode = mode;
        }
    }
}

impl FrameEvents for Inbox {
    fn on_stream_byte(&mut self, byte: u8) {
        if self.stream.is_full() {
            self.stream.pop_front();
        }
        let _ = self.stream.push_back(byte);
    }
}

impl PacketHandler<OtCommandResponse> for Inbox {
    fn on_packet(&mut self, packet: OtCommandResponse) {
        // Errors are latched until stop()
        if self.mode.is_error() {
            warn!(
                "response {=u32:#x} ignored in {}",
                packet.payload,
                self.mode.as_str()
            );
            return;
        }

        self.data = packet.payload;
        self.response_status = packet.response_status;

        if self.verify_parity && !check_parity(packet.payload) {
            warn!("response {=u32:#x} failed parity", packet.payload);
            self.set_mode(Mode::ErrorProtocol);
        } else {
            self.set_mode(Mode::Received);
        }
    }
}

impl PacketHandler<GenericStatusResponse> for Inbox {
    fn on_packet(&mut self, packet: GenericStatusResponse) {
        debug!(
            "generic status: ext temp {=f32} light {=u16}",
            packet.ext_temp,
            packet.light_value
        );
        self.generic_status = Some(packet);
    }
}

impl PacketHandler<CpuStatusResponse> for Inbox {
    fn on_packet(&mut self, packet: CpuStatusResponse) {
        debug!(
            "co-processor cpu {=u8} fw {=u8} rev {=u8} up {=u32}s",
            packet.cpu_version,
            packet.firmware_version,
            packet.board_revision,
            packet.uptime
        );
        self.cpu_status = Some(packet);
    }
}

impl PacketHandler<LogRequest> for Inbox {
    fn on_packet(&mut self, packet: LogRequest) {
        info!("co-processor: {=[u8]:a}", packet.text());
        self.last_log = Some(packet);
    }
}

/// OpenTherm session bound to one UART
pub struct Session<U: Uart> {
    uart: U,
    engine: FramingEngine<Inbox>,
    inbox: Inbox,
    config: SessionConfig,
    policy: TrailerPolicy,
    /// Time spent in SENT, for the optional response deadline
    waited_ms: u32,
}

impl<U: Uart> Session<U> {
    /// Create a session and register the co-processor's packets
    pub fn new(uart: U, config: SessionConfig) -> Result<Self, RegistryError> {
        let registry = PacketRegistry::<Inbox>::new()
            .with::<OtCommandResponse>()?
            .with::<GenericStatusResponse>()?
            .with::<CpuStatusResponse>()?
            .with::<LogRequest>()?;
        let policy = TrailerPolicy::from(config.trailer);

        Ok(Self {
            uart,
            engine: FramingEngine::new(registry, policy),
            inbox: Inbox {
                verify_parity: config.verify_response_parity,
                ..Inbox::default()
            },
            config,
            policy,
            waited_ms: 0,
        })
    }

    /// Send an OpenTherm request
    ///
    /// The message is packed with even parity, framed and written out; the
    /// session moves to SENT. Any previous response is discarded.
    pub fn send(&mut self, msg: &OpenThermMessage) -> Result<(), SessionError<<U as UartTx>::Error>> {
        let word = msg.to_word();
        debug!("send {=u32:#x}", word);

        self.write_packet(&OtCommandRequest { payload: word })?;
        self.waited_ms = 0;
        self.inbox.set_mode(Mode::Sent);
        Ok(())
    }

    /// Ask the co-processor for its version and uptime
    pub fn request_cpu_status(&mut self) -> Result<(), SessionError<<U as UartTx>::Error>> {
        self.write_packet(&CpuStatusRequest::default())
    }

    fn write_packet<P: Packet>(&mut self, packet: &P) -> Result<(), SessionError<<U as UartTx>::Error>> {
        let frame = encode_to_vec(packet, self.policy)?;
        self.uart
            .write_blocking(&frame)
            .map_err(SessionError::Transport)?;
        // The frame must be on the wire before the response clock starts
        self.uart.flush().map_err(SessionError::Transport)
    }

    /// Drain every buffered byte from the UART into the framing engine
    ///
    /// Returns the number of packets dispatched.
    pub fn poll(&mut self) -> Result<usize, SessionError<<U as UartRx>::Error>> {
        let mut dispatched = 0;

        while self.uart.has_data() {
            let Some(byte) = self.uart.read_byte().map_err(SessionError::Transport)? else {
                break;
            };

            match self.engine.feed(byte, &mut self.inbox) {
                Ok(Some(type_id)) => {
                    trace!("dispatched packet type {=u8}", type_id);
                    dispatched += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("frame dropped: {}", e);
                }
            }
        }

        Ok(dispatched)
    }

    /// Advance the response deadline by `delta_ms`
    ///
    /// Has no effect unless a response timeout is configured.
    pub fn tick(&mut self, delta_ms: u32) -> Mode {
        if let (Mode::Sent, Some(timeout)) = (self.inbox.mode, self.config.response_timeout_ms) {
            self.waited_ms = self.waited_ms.saturating_add(delta_ms);
            if self.waited_ms >= timeout {
                warn!("no response after {=u32} ms", self.waited_ms);
                self.inbox.set_mode(Mode::ErrorTimeout);
            }
        }
        self.inbox.mode
    }

    /// The last response, while the session is RECEIVED
    ///
    /// Keeps returning the same message until [`stop`](Self::stop).
    pub fn get_message(&self) -> Option<OpenThermMessage> {
        match self.inbox.mode {
            Mode::Received => Some(OpenThermMessage::from_word(self.inbox.data)),
            _ => None,
        }
    }

    /// Co-processor status byte of the last response
    pub fn response_status(&self) -> Option<u8> {
        match self.inbox.mode {
            Mode::Received => Some(self.inbox.response_status),
            _ => None,
        }
    }

    /// Return to IDLE, clearing any response or error
    ///
    /// Error states are only left through here; responses arriving while
    /// in an error state are dropped.
    pub fn stop(&mut self) {
        self.waited_ms = 0;
        self.inbox.set_mode(Mode::Idle);
    }

    pub fn mode(&self) -> Mode {
        self.inbox.mode
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn generic_status(&self) -> Option<&GenericStatusResponse> {
        self.inbox.generic_status.as_ref()
    }

    pub fn cpu_status(&self) -> Option<&CpuStatusResponse> {
        self.inbox.cpu_status.as_ref()
    }

    pub fn last_log(&self) -> Option<&LogRequest> {
        self.inbox.last_log.as_ref()
    }

    /// Move queued streaming bytes into `buf`, oldest first
    pub fn read_stream(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        for slot in buf.iter_mut() {
            match self.inbox.stream.pop_front() {
                Some(byte) => {
                    *slot = byte;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    pub fn frame_stats(&self) -> &FrameStats {
        self.engine.stats()
    }

    /// Give back the UART
    pub fn release(self) -> U {
        self.uart
    }
}
