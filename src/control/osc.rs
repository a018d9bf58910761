//! OSC control listener
//!
//! Receives OSC datagrams on a UDP socket and publishes updated control
//! state. Runs on its own thread: the socket uses a bounded read timeout
//! so a stop flag is observed between receives and shutdown is
//! deterministic (the thread is never left permanently blocked).
//!
//! The transport is unordered and unacknowledged; if datagrams arrive
//! reordered, the last one to arrive wins. That matches the shared
//! cell's last-write-wins semantics and is accepted by design.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rosc::{decoder, OscMessage, OscPacket, OscType};
use thiserror::Error;

use super::state::{ControlCell, ControlState, Mode};

/// Address of the mode command. One string argument.
pub const MODE_ADDR: &str = "/glow/mode";

/// Address of the level command. One numeric argument.
pub const LEVEL_ADDR: &str = "/glow/level";

/// The one string that selects audio-reactive mode (case-sensitive).
const AUDIO_REACTIVE_SENTINEL: &str = "audioReactive";

/// How long a receive may block before the stop flag is rechecked.
const RECV_TIMEOUT: Duration = Duration::from_millis(250);

/// Errors that can occur while starting the listener
#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("failed to bind control socket: {0}")]
    Bind(#[source] io::Error),

    #[error("failed to configure control socket: {0}")]
    Configure(#[source] io::Error),

    #[error("failed to spawn listener thread: {0}")]
    Spawn(#[source] io::Error),
}

/// A decoded control command
#[derive(Debug, Clone, PartialEq)]
enum Command {
    SetMode(Mode),
    SetLevel(f32),
}

/// Per-message decode failures; logged and discarded, never fatal
#[derive(Error, Debug)]
enum DecodeError {
    #[error("{addr} expects exactly one string argument, got {got:?}")]
    BadModeArgs { addr: String, got: Vec<OscType> },

    #[error("{addr} expects exactly one numeric argument, got {got:?}")]
    BadLevelArgs { addr: String, got: Vec<OscType> },
}

/// OSC-over-UDP control listener thread handle.
///
/// The socket is bound in [`OscListener::start`] before the thread
/// spawns, so a bind failure surfaces to the caller as a startup error
/// instead of dying silently inside the thread.
pub struct OscListener {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl OscListener {
    /// Bind the control socket and start the listener thread.
    pub fn start(port: u16, cell: Arc<ControlCell>) -> Result<Self, ListenerError> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).map_err(ListenerError::Bind)?;
        socket
            .set_read_timeout(Some(RECV_TIMEOUT))
            .map_err(ListenerError::Configure)?;
        let local_addr = socket.local_addr().map_err(ListenerError::Configure)?;

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("osc-listener".to_string())
            .spawn(move || run(socket, cell, thread_stop))
            .map_err(ListenerError::Spawn)?;

        log::info!("OSC listener bound on {}", local_addr);

        Ok(Self {
            stop,
            handle: Some(handle),
            local_addr,
        })
    }

    /// The bound socket address (useful when started with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal the thread to stop and wait for it to exit.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("OSC listener thread panicked");
            } else {
                log::info!("OSC listener stopped");
            }
        }
    }
}

impl Drop for OscListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Listener thread body: receive, decode, publish, until stopped.
fn run(socket: UdpSocket, cell: Arc<ControlCell>, stop: Arc<AtomicBool>) {
    let mut buf = [0u8; decoder::MTU];

    while !stop.load(Ordering::Relaxed) {
        let (size, peer) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                continue;
            }
            Err(e) => {
                log::error!("control socket receive failed: {}", e);
                continue;
            }
        };

        match decoder::decode_udp(&buf[..size]) {
            Ok((_, packet)) => handle_packet(&packet, &cell),
            Err(e) => {
                log::warn!("discarding undecodable datagram from {}: {:?}", peer, e);
            }
        }
    }
}

/// Apply a decoded packet, flattening bundles.
fn handle_packet(packet: &OscPacket, cell: &ControlCell) {
    match packet {
        OscPacket::Message(msg) => apply_message(msg, cell),
        OscPacket::Bundle(bundle) => {
            for inner in &bundle.content {
                handle_packet(inner, cell);
            }
        }
    }
}

/// Decode one message and publish the resulting state.
///
/// Read-modify-publish on the cell is safe here: this is the only
/// writer thread, and readers only see whole records.
fn apply_message(msg: &OscMessage, cell: &ControlCell) {
    match decode_message(msg) {
        Ok(Some(command)) => {
            let current = cell.snapshot();
            let next = match command {
                Command::SetMode(mode) => ControlState {
                    mode,
                    level: current.level,
                },
                Command::SetLevel(level) => ControlState {
                    mode: current.mode,
                    level,
                },
            };
            log::info!("control update: {:?} -> {:?}", current, next);
            cell.publish(next);
        }
        Ok(None) => {
            log::debug!("ignoring message with unknown address {}", msg.addr);
        }
        Err(e) => {
            log::warn!("discarding malformed control message: {}", e);
        }
    }
}

/// Decode a message into a command.
///
/// Returns `Ok(None)` for unrecognized addresses (silently ignored) and
/// `Err` for recognized addresses with the wrong argument shape.
fn decode_message(msg: &OscMessage) -> Result<Option<Command>, DecodeError> {
    match msg.addr.as_str() {
        MODE_ADDR => match msg.args.as_slice() {
            [OscType::String(s)] => {
                let mode = if s == AUDIO_REACTIVE_SENTINEL {
                    Mode::AudioReactive
                } else {
                    Mode::Manual
                };
                Ok(Some(Command::SetMode(mode)))
            }
            _ => Err(DecodeError::BadModeArgs {
                addr: msg.addr.clone(),
                got: msg.args.clone(),
            }),
        },
        LEVEL_ADDR => match msg.args.as_slice() {
            [OscType::Float(f)] => Ok(Some(Command::SetLevel(*f))),
            [OscType::Int(i)] => Ok(Some(Command::SetLevel(*i as f32))),
            [OscType::Double(d)] => Ok(Some(Command::SetLevel(*d as f32))),
            _ => Err(DecodeError::BadLevelArgs {
                addr: msg.addr.clone(),
                got: msg.args.clone(),
            }),
        },
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn msg(addr: &str, args: Vec<OscType>) -> OscMessage {
        OscMessage {
            addr: addr.to_string(),
            args,
        }
    }

    #[test]
    fn mode_sentinel_selects_audio_reactive() {
        let decoded = decode_message(&msg(
            MODE_ADDR,
            vec![OscType::String("audioReactive".to_string())],
        ));
        assert_eq!(
            decoded.unwrap(),
            Some(Command::SetMode(Mode::AudioReactive))
        );
    }

    #[test]
    fn any_other_mode_string_selects_manual() {
        for s in ["manual", "AudioReactive", "audioreactive", ""] {
            let decoded =
                decode_message(&msg(MODE_ADDR, vec![OscType::String(s.to_string())]));
            assert_eq!(decoded.unwrap(), Some(Command::SetMode(Mode::Manual)));
        }
    }

    #[test]
    fn level_accepts_float_int_and_double() {
        let cases = [
            (OscType::Float(0.5), 0.5),
            (OscType::Int(2), 2.0),
            (OscType::Double(0.25), 0.25),
        ];
        for (arg, expected) in cases {
            let decoded = decode_message(&msg(LEVEL_ADDR, vec![arg]));
            assert_eq!(decoded.unwrap(), Some(Command::SetLevel(expected)));
        }
    }

    #[test]
    fn unknown_address_is_ignored() {
        let decoded = decode_message(&msg("/glow/unknown", vec![OscType::Float(1.0)]));
        assert_eq!(decoded.unwrap(), None);
    }

    #[test]
    fn wrong_arity_or_type_is_an_error() {
        // Wrong type for mode
        assert!(decode_message(&msg(MODE_ADDR, vec![OscType::Float(1.0)])).is_err());
        // Missing argument
        assert!(decode_message(&msg(LEVEL_ADDR, vec![])).is_err());
        // Too many arguments
        assert!(decode_message(&msg(
            LEVEL_ADDR,
            vec![OscType::Float(1.0), OscType::Float(2.0)]
        ))
        .is_err());
    }

    #[test]
    fn mode_update_preserves_level_and_vice_versa() {
        let cell = ControlCell::default();
        cell.publish(ControlState {
            mode: Mode::Manual,
            level: 0.7,
        });

        apply_message(
            &msg(MODE_ADDR, vec![OscType::String("audioReactive".to_string())]),
            &cell,
        );
        let state = cell.snapshot();
        assert_eq!(state.mode, Mode::AudioReactive);
        assert_eq!(state.level, 0.7);

        apply_message(&msg(LEVEL_ADDR, vec![OscType::Float(0.5)]), &cell);
        let state = cell.snapshot();
        assert_eq!(state.mode, Mode::AudioReactive);
        assert_eq!(state.level, 0.5);
    }

    #[test]
    fn malformed_message_leaves_state_unchanged() {
        let cell = ControlCell::default();
        let before = cell.snapshot();
        apply_message(&msg(LEVEL_ADDR, vec![OscType::String("0.5".to_string())]), &cell);
        assert_eq!(cell.snapshot(), before);
    }

    #[test]
    fn listener_applies_datagrams_end_to_end() {
        let cell = Arc::new(ControlCell::default());
        let mut listener = OscListener::start(0, Arc::clone(&cell)).unwrap();
        let target = listener.local_addr();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let packet = OscPacket::Message(msg(LEVEL_ADDR, vec![OscType::Float(0.9)]));
        let bytes = rosc::encoder::encode(&packet).unwrap();
        sender.send_to(&bytes, ("127.0.0.1", target.port())).unwrap();

        // Poll until the listener has applied the update.
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if cell.snapshot().level == 0.9 {
                break;
            }
            assert!(Instant::now() < deadline, "listener never applied update");
            thread::sleep(Duration::from_millis(10));
        }

        listener.stop();
    }
}
