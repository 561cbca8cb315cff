//! TCP connection carrying length-prefixed messages.
//!
//! Each message on the wire is a 4-byte big-endian length followed by that
//! many payload bytes, in both directions. Inbound payloads are telemetry
//! frames; outbound payloads are JSON [`ControlMessage`]s.
//!
//! No application logic here. Callers drive timing and decode payloads.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

use crate::control::ControlMessage;

/// Default robot address.
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 10272;

/// Default upper bound on one inbound message.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

const LEN_PREFIX: usize = 4;

/// Errors from connection operations.
#[derive(Debug, Error)]
pub enum ConnError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("recv timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("connection closed by peer")]
    Disconnected,

    #[error("message of {len} bytes exceeds limit of {max}")]
    Oversized { len: usize, max: usize },

    #[error("failed to encode control message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no address found for {0}")]
    Unresolved(String),
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Prefix `payload` with its big-endian length.
pub fn encode_message(payload: &[u8]) -> Vec<u8> {
    let mut wire = Vec::with_capacity(LEN_PREFIX + payload.len());
    wire.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    wire.extend_from_slice(payload);
    wire
}

/// Reassembles length-prefixed messages from arbitrary TCP chunks.
///
/// Partial messages are buffered for the next call.
#[derive(Debug)]
pub struct MessageSplitter {
    buf: Vec<u8>,
    max_message: usize,
}

impl MessageSplitter {
    pub fn new(max_message: usize) -> Self {
        Self { buf: Vec::with_capacity(4096), max_message }
    }

    /// Feed new data and extract any complete messages, in arrival order.
    ///
    /// An oversized length prefix is an error; the stream cannot be
    /// resynchronized after one.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Vec<u8>>, ConnError> {
        self.buf.extend_from_slice(data);
        let mut messages = Vec::new();
        let mut start = 0;

        while let Some(prefix) = self.buf.get(start..start + LEN_PREFIX) {
            let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
            if len > self.max_message {
                return Err(ConnError::Oversized { len, max: self.max_message });
            }
            let body = start + LEN_PREFIX;
            let Some(payload) = self.buf.get(body..body + len) else {
                break;
            };
            messages.push(payload.to_vec());
            start = body + len;
        }

        self.buf.drain(..start);
        Ok(messages)
    }

    /// Bytes held for an incomplete message.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl Default for MessageSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_BYTES)
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Blocking TCP connection to the robot.
///
/// Synchronous. Callers drive timing via [`recv_timeout`](Self::recv_timeout)
/// or move the connection onto a reader thread and send through a
/// [`MessageWriter`].
///
/// # Example
///
/// ```no_run
/// use roboscope::{Connection, TelemetryFrame};
///
/// let mut conn = Connection::connect(("localhost", roboscope::conn::DEFAULT_PORT))?;
/// loop {
///     let bytes = conn.recv()?;
///     match TelemetryFrame::decode(&bytes) {
///         Ok(frame) => println!("{} particles", frame.particles.len()),
///         Err(e) => eprintln!("bad frame: {e}"),
///     }
/// }
/// # Ok::<(), roboscope::ConnError>(())
/// ```
pub struct Connection {
    stream: TcpStream,
    splitter: MessageSplitter,
    read_buf: Vec<u8>,
    /// Messages split from the stream but not yet returned by `recv()`.
    pending: VecDeque<Vec<u8>>,
}

impl Connection {
    /// Connect with the system default timeout.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ConnError> {
        let stream = TcpStream::connect(addr)?;
        Ok(Self::from_stream(stream))
    }

    /// Resolve `host:port` and connect to the first address that answers
    /// within `timeout`.
    pub fn connect_timeout(host: &str, port: u16, timeout: Duration) -> Result<Self, ConnError> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(Self::from_stream(stream)),
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => ConnError::Io(e),
            None => ConnError::Unresolved(format!("{host}:{port}")),
        })
    }

    /// Wrap an accepted or already-connected stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        Self {
            stream,
            splitter: MessageSplitter::default(),
            read_buf: vec![0u8; 64 * 1024],
            pending: VecDeque::new(),
        }
    }

    /// Reject inbound messages larger than `max` bytes.
    pub fn with_max_message(mut self, max: usize) -> Self {
        self.splitter.max_message = max;
        self
    }

    /// A second handle for sending while this one blocks in `recv()`.
    pub fn writer(&self) -> Result<MessageWriter, ConnError> {
        Ok(MessageWriter { stream: self.stream.try_clone()? })
    }

    /// Send one message.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), ConnError> {
        self.stream.write_all(&encode_message(payload))?;
        Ok(())
    }

    /// Block until a complete message arrives.
    pub fn recv(&mut self) -> Result<Vec<u8>, ConnError> {
        self.stream.set_read_timeout(None)?;
        self.recv_inner()
    }

    /// Block up to `timeout` for a complete message.
    ///
    /// Partial data read before the timeout is kept for the next call.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Vec<u8>, ConnError> {
        self.stream.set_read_timeout(Some(timeout))?;
        match self.recv_inner() {
            Err(ConnError::Io(ref e))
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                Err(ConnError::Timeout { timeout })
            }
            other => other,
        }
    }

    pub fn peer_addr(&self) -> Result<SocketAddr, ConnError> {
        Ok(self.stream.peer_addr()?)
    }

    /// Shut down both directions; a thread blocked in `recv()` wakes with
    /// [`ConnError::Disconnected`].
    pub fn shutdown(&self) -> Result<(), ConnError> {
        self.stream.shutdown(Shutdown::Both)?;
        Ok(())
    }

    fn recv_inner(&mut self) -> Result<Vec<u8>, ConnError> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(message);
            }

            let n = self.stream.read(&mut self.read_buf)?;
            if n == 0 {
                return Err(ConnError::Disconnected);
            }
            self.pending.extend(self.splitter.feed(&self.read_buf[..n])?);
        }
    }
}

/// Send half of a [`Connection`].
#[derive(Debug)]
pub struct MessageWriter {
    stream: TcpStream,
}

impl MessageWriter {
    pub fn send(&mut self, payload: &[u8]) -> Result<(), ConnError> {
        self.stream.write_all(&encode_message(payload))?;
        Ok(())
    }

    /// Serialize and send a control message as JSON.
    pub fn send_control(&mut self, msg: &ControlMessage) -> Result<(), ConnError> {
        let json = msg.to_json()?;
        self.send(json.as_bytes())
    }

    /// Shut down the shared socket, which also ends the reader side.
    pub fn shutdown(&self) -> Result<(), ConnError> {
        self.stream.shutdown(Shutdown::Both)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Pose2;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn splitter_reassembles_across_chunks() {
        let mut wire = encode_message(b"first");
        wire.extend(encode_message(b""));
        wire.extend(encode_message(b"third message"));

        let mut splitter = MessageSplitter::default();
        let mut out = Vec::new();
        for chunk in wire.chunks(3) {
            out.extend(splitter.feed(chunk).unwrap());
        }
        assert_eq!(out, vec![b"first".to_vec(), Vec::new(), b"third message".to_vec()]);
        assert_eq!(splitter.buffered(), 0);
    }

    #[test]
    fn splitter_holds_partial_message() {
        let wire = encode_message(b"abcdef");
        let mut splitter = MessageSplitter::default();
        assert!(splitter.feed(&wire[..7]).unwrap().is_empty());
        assert_eq!(splitter.buffered(), 7);
        assert_eq!(splitter.feed(&wire[7..]).unwrap(), vec![b"abcdef".to_vec()]);
    }

    #[test]
    fn splitter_rejects_oversized_prefix() {
        let mut splitter = MessageSplitter::new(8);
        let err = splitter.feed(&encode_message(&[0u8; 9])).unwrap_err();
        assert!(matches!(err, ConnError::Oversized { len: 9, max: 8 }));
    }

    #[test]
    fn loopback_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut conn = Connection::from_stream(stream);
            conn.send(b"frame-1").unwrap();
            conn.send(b"frame-2").unwrap();
            conn.recv().unwrap()
        });

        let mut client =
            Connection::connect_timeout("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        assert_eq!(client.recv().unwrap(), b"frame-1");
        assert_eq!(client.recv_timeout(Duration::from_secs(2)).unwrap(), b"frame-2");

        let mut writer = client.writer().unwrap();
        writer
            .send_control(&ControlMessage::set_nav_goal(Pose2::new(1.0, 2.0, 0.0)))
            .unwrap();
        let got = server.join().unwrap();
        let msg: ControlMessage = serde_json::from_slice(&got).unwrap();
        assert_eq!(msg.pose(), Pose2::new(1.0, 2.0, 0.0));

        assert!(matches!(client.recv(), Err(ConnError::Disconnected)));
    }

    #[test]
    fn recv_timeout_reports_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = Connection::connect(addr).unwrap();
        let _held = listener.accept().unwrap();
        let err = client.recv_timeout(Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, ConnError::Timeout { .. }));
    }
}
