//! Peer transport for networked matches.
//!
//! One JSON move object per line. `receive` blocks until a full line
//! arrives; `shutdown` closes the socket so a blocked `receive` returns.

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpListener, TcpStream, ToSocketAddrs};

use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer closed the connection")]
    Closed,
    #[error("payload contains a line break")]
    Framing,
    #[error("transport io: {0}")]
    Io(#[from] std::io::Error),
}

pub trait Transport: Send + Sync {
    fn send(&self, bytes: &[u8]) -> Result<(), TransportError>;
    fn receive(&self) -> Result<Vec<u8>, TransportError>;
    fn shutdown(&self);
}

/// Newline-framed TCP connection to the other player.
pub struct TcpTransport {
    reader: Mutex<BufReader<TcpStream>>,
    writer: Mutex<TcpStream>,
    peer: String,
}

impl TcpTransport {
    /// Binds `addr` and waits for exactly one peer.
    pub fn host(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)?;
        Self::accept(&listener)
    }

    pub fn accept(listener: &TcpListener) -> Result<Self, TransportError> {
        let (stream, _) = listener.accept()?;
        Self::from_stream(stream)
    }

    pub fn join(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        Self::from_stream(TcpStream::connect(addr)?)
    }

    fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        stream.set_nodelay(true)?;
        let peer = stream
            .peer_addr()
            .map_or_else(|_| "unknown".to_string(), |a| a.to_string());
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: Mutex::new(BufReader::new(stream)),
            writer: Mutex::new(writer),
            peer,
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl Transport for TcpTransport {
    fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if bytes.contains(&b'\n') {
            return Err(TransportError::Framing);
        }
        let mut writer = self.writer.lock();
        writer.write_all(bytes)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    fn receive(&self) -> Result<Vec<u8>, TransportError> {
        let mut reader = self.reader.lock();
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                return Err(TransportError::Closed);
            }
            while matches!(line.last(), Some(b'\n' | b'\r')) {
                line.pop();
            }
            if !line.is_empty() {
                return Ok(line);
            }
        }
    }

    fn shutdown(&self) {
        // Already-closed sockets report NotConnected; nothing to do then.
        let _ = self.writer.lock().shutdown(Shutdown::Both);
    }
}
