//! The connection-oriented byte channel protocol engines drive. Abstracted
//! behind a trait so engines can be exercised against an in-memory mock in
//! tests instead of a real socket.

use std::io;
use std::io::Read;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::error::Error;
use crate::packet::{ByteOrder, Packet};

const RECV_CHUNK_SIZE: usize = 2048;

/// Which wire family a protocol speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Udp,
    Tcp,
}

/// Capability a protocol engine needs: send bytes, receive a datagram or
/// stream segment, each bounded by a deadline armed fresh before the I/O,
/// and release the underlying resource on demand.
pub trait Transport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), Error>;
    fn receive(&mut self) -> Result<Packet, Error>;
    fn close(&mut self) -> Result<(), Error>;
    fn ip(&self) -> &str;
    fn port(&self) -> u16;
}

enum Socket {
    Udp(UdpSocket),
    Tcp(TcpStream),
}

/// An `io::Error` whose kind indicates the armed deadline fired, rather than
/// some other transport failure, is surfaced as `Error::DeadlineExceeded`
/// instead of the generic `Error::Transport` wrapper.
fn classify_io_error(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::DeadlineExceeded,
        _ => Error::Transport(err),
    }
}

/// The concrete [`Transport`] used outside of tests: `std::net` sockets with
/// the timeout re-armed before every operation. `socket` is `None` once
/// `close` has run; any further operation fails rather than panicking.
pub struct NetworkTransport {
    socket: Option<Socket>,
    ip: String,
    port: u16,
    timeout: Duration,
}

impl NetworkTransport {
    pub fn open(network: Network, ip: &str, port: u16, timeout: Duration) -> Result<Self, Error> {
        let addr: SocketAddr = (ip, port)
            .to_socket_addrs()
            .map_err(classify_io_error)?
            .next()
            .ok_or_else(|| Error::framing(format!("could not resolve address {ip}:{port}")))?;

        let socket = match network {
            Network::Udp => {
                let bind_addr: SocketAddr = if addr.is_ipv6() {
                    "[::]:0".parse().unwrap()
                } else {
                    "0.0.0.0:0".parse().unwrap()
                };
                let udp = UdpSocket::bind(bind_addr).map_err(classify_io_error)?;
                udp.connect(addr).map_err(classify_io_error)?;
                udp.set_read_timeout(Some(timeout))
                    .map_err(classify_io_error)?;
                udp.set_write_timeout(Some(timeout))
                    .map_err(classify_io_error)?;
                Socket::Udp(udp)
            }
            Network::Tcp => {
                let tcp = TcpStream::connect_timeout(&addr, timeout).map_err(classify_io_error)?;
                tcp.set_read_timeout(Some(timeout))
                    .map_err(classify_io_error)?;
                tcp.set_write_timeout(Some(timeout))
                    .map_err(classify_io_error)?;
                Socket::Tcp(tcp)
            }
        };

        Ok(Self {
            socket: Some(socket),
            ip: ip.to_string(),
            port,
            timeout,
        })
    }

    fn socket(&self) -> Result<&Socket, Error> {
        self.socket
            .as_ref()
            .ok_or_else(|| Error::semantic("transport already closed"))
    }

    fn socket_mut(&mut self) -> Result<&mut Socket, Error> {
        self.socket
            .as_mut()
            .ok_or_else(|| Error::semantic("transport already closed"))
    }

    fn rearm(&self) -> Result<(), Error> {
        match self.socket()? {
            Socket::Udp(udp) => {
                udp.set_read_timeout(Some(self.timeout))
                    .map_err(classify_io_error)?;
                udp.set_write_timeout(Some(self.timeout))
                    .map_err(classify_io_error)?;
            }
            Socket::Tcp(tcp) => {
                tcp.set_read_timeout(Some(self.timeout))
                    .map_err(classify_io_error)?;
                tcp.set_write_timeout(Some(self.timeout))
                    .map_err(classify_io_error)?;
            }
        }
        Ok(())
    }
}

impl Transport for NetworkTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), Error> {
        use std::io::Write;

        self.rearm()?;
        match self.socket_mut()? {
            Socket::Udp(udp) => {
                udp.send(bytes).map_err(classify_io_error)?;
            }
            Socket::Tcp(tcp) => {
                tcp.write_all(bytes).map_err(classify_io_error)?;
            }
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Packet, Error> {
        self.rearm()?;
        let mut packet = Packet::new(ByteOrder::Little);

        match self.socket_mut()? {
            Socket::Udp(udp) => {
                // Single datagram; buffer is sized generously and truncated
                // to the bytes actually received.
                let mut buf = vec![0u8; RECV_CHUNK_SIZE.max(2048)];
                let size = udp.recv(&mut buf).map_err(classify_io_error)?;
                buf.truncate(size);
                packet.set_buffer(buf);
            }
            Socket::Tcp(tcp) => {
                // Loop reading fixed-size chunks, appending to an
                // accumulator, stopping once a read returns fewer bytes
                // than the chunk size or EOF. This is a heuristic: a
                // segment that coincidentally equals RECV_CHUNK_SIZE bytes
                // would be read again rather than treated as final. A
                // length-driven drain against the declared outer varint
                // length would avoid that, at the cost of needing to peek
                // the frame length before committing to "done".
                let mut accumulator = Vec::new();
                loop {
                    let mut chunk = vec![0u8; RECV_CHUNK_SIZE];
                    let read = tcp.read(&mut chunk).map_err(classify_io_error)?;
                    accumulator.extend_from_slice(&chunk[..read]);
                    if read < RECV_CHUNK_SIZE {
                        break;
                    }
                }
                packet.set_buffer(accumulator);
            }
        }

        Ok(packet)
    }

    fn close(&mut self) -> Result<(), Error> {
        if let Some(Socket::Tcp(tcp)) = &self.socket {
            // UDP sockets have no connection state to tear down; the TCP
            // stream gets an explicit shutdown rather than relying solely
            // on the fd closing when `socket` is dropped.
            let _ = tcp.shutdown(std::net::Shutdown::Both);
        }
        self.socket = None;
        Ok(())
    }

    fn ip(&self) -> &str {
        &self.ip
    }

    fn port(&self) -> u16 {
        self.port
    }
}
