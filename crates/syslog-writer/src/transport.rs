// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Reconnecting connection to a remote syslog collector.

use std::{
    fmt,
    io::{self, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket},
    str::FromStr,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{
    errors::TransportError,
    format::Header,
    priority::{Priority, Severity},
};

/// Network protocol used to reach the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Stream transport; one line per record.
    Tcp,
    /// Datagram transport; one datagram per record.
    Udp,
}

impl FromStr for Protocol {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(TransportError::InvalidProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
            Protocol::Udp => f.write_str("udp"),
        }
    }
}

/// Immutable transport configuration.
#[derive(Debug, Clone)]
pub struct SyslogConfig {
    pub protocol: Protocol,
    /// Collector address as `host:port`.
    pub address: String,
    pub tag: String,
    /// Severity stamped on every line.
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Disconnected,
    Connected,
    /// Terminal.
    Closed,
}

enum Connection {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl Connection {
    fn dial(protocol: Protocol, address: &str) -> io::Result<Self> {
        match protocol {
            Protocol::Tcp => {
                let stream = TcpStream::connect(address)?;
                stream.set_nodelay(true)?;
                Ok(Connection::Tcp(stream))
            }
            Protocol::Udp => {
                let mut last_err = None;
                for addr in address.to_socket_addrs()? {
                    match udp_connect(addr) {
                        Ok(socket) => return Ok(Connection::Udp(socket)),
                        Err(e) => last_err = Some(e),
                    }
                }
                Err(last_err.unwrap_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("could not resolve {address}"),
                    )
                }))
            }
        }
    }

    /// A stream whose peer already sent FIN is stale; the collector never
    /// sends data, so any readable byte count of zero means it hung up.
    fn is_stale(&self) -> bool {
        let Connection::Tcp(stream) = self else {
            return false;
        };
        if stream.set_nonblocking(true).is_err() {
            return true;
        }
        let mut probe = [0u8; 1];
        let stale = match stream.peek(&mut probe) {
            Ok(0) => true,
            Ok(_) => false,
            Err(e) => e.kind() != io::ErrorKind::WouldBlock,
        };
        stale || stream.set_nonblocking(false).is_err()
    }

    fn send(&mut self, line: &[u8]) -> io::Result<()> {
        match self {
            Connection::Tcp(stream) => {
                stream.write_all(line)?;
                stream.flush()
            }
            Connection::Udp(socket) => {
                let sent = socket.send(line)?;
                if sent != line.len() {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("datagram truncated: sent {sent} of {} bytes", line.len()),
                    ));
                }
                Ok(())
            }
        }
    }

    fn close(self) -> io::Result<()> {
        match self {
            Connection::Tcp(mut stream) => {
                stream.flush()?;
                match stream.shutdown(Shutdown::Both) {
                    Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
                    _ => Ok(()),
                }
            }
            Connection::Udp(_) => Ok(()),
        }
    }
}

fn udp_connect(addr: SocketAddr) -> io::Result<UdpSocket> {
    let local: SocketAddr = if addr.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };
    let socket = UdpSocket::bind(local)?;
    socket.connect(addr)?;
    Ok(socket)
}

struct Inner {
    connection: Option<Connection>,
    state: TransportState,
}

/// Single reconnecting writer to a syslog collector.
///
/// All operations serialize on one lock that guards the connection handle
/// and the state together. The lock is only held for one dial or one send.
pub struct Transport {
    config: SyslogConfig,
    header: Header,
    inner: Mutex<Inner>,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl Transport {
    /// Create a disconnected transport. No I/O happens until the first
    /// [`connect`](Self::connect) or [`write`](Self::write).
    #[must_use]
    pub fn new(config: SyslogConfig) -> Self {
        let header = Header::new(Priority::from(config.severity), &config.tag);
        Self {
            config,
            header,
            inner: Mutex::new(Inner {
                connection: None,
                state: TransportState::Disconnected,
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> TransportState {
        self.lock().state
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A writer that panicked mid-send leaves the connection in an unknown
        // state; the next write re-validates it anyway.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dial the collector, replacing any existing connection.
    pub fn connect(&self) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if inner.state == TransportState::Closed {
            return Err(TransportError::Closed);
        }
        self.dial(&mut inner)
    }

    fn dial(&self, inner: &mut Inner) -> Result<(), TransportError> {
        if let Some(old) = inner.connection.take() {
            let _ = old.close();
        }
        inner.state = TransportState::Disconnected;
        let connection = Connection::dial(self.config.protocol, &self.config.address)
            .map_err(TransportError::Connect)?;
        inner.connection = Some(connection);
        inner.state = TransportState::Connected;
        Ok(())
    }

    /// Send `buf` as one syslog line.
    ///
    /// Makes at most one dial attempt. A failed send drops the connection so
    /// the next call dials again; the failed record is not retried. Returns
    /// `buf.len()` on success.
    pub fn write(&self, buf: &[u8]) -> Result<usize, TransportError> {
        let mut inner = self.lock();
        let state = inner.state;
        let live = inner.connection.as_ref().is_some_and(|c| !c.is_stale());
        match state {
            TransportState::Closed => return Err(TransportError::Closed),
            TransportState::Connected if live => {}
            _ => self.dial(&mut inner)?,
        }

        let line = self.header.frame(buf);
        let result = match inner.connection.as_mut() {
            Some(connection) => connection.send(&line),
            None => Err(io::Error::from(io::ErrorKind::NotConnected)),
        };
        match result {
            Ok(()) => Ok(buf.len()),
            Err(e) => {
                inner.connection = None;
                inner.state = TransportState::Disconnected;
                Err(TransportError::Write(e))
            }
        }
    }

    /// Close the connection for good.
    ///
    /// Idempotent: once closed, or when nothing was ever connected, this
    /// returns `Ok(())` without touching the network. The state becomes
    /// `Closed` either way.
    pub fn close(&self) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if inner.state == TransportState::Closed {
            return Ok(());
        }
        inner.state = TransportState::Closed;
        match inner.connection.take() {
            Some(connection) => connection.close().map_err(TransportError::Close),
            None => Ok(()),
        }
    }
}

impl Write for &Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Transport::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
