//! Queries a game server's status over its native binary protocol.
//!
//! Three protocol engines are built in: Valve's Source engine A2S query,
//! Minecraft's legacy GameSpy-derived UDP query, and Minecraft's modern TCP
//! status ping. [`query`] picks a protocol by game name; [`detect`] races
//! every known protocol against an endpoint and returns whichever answers,
//! which is useful when the game behind an address isn't known up front.
//!
//! ```no_run
//! use gamequery::Request;
//!
//! let request = Request::new("127.0.0.1").game("source").port(27015);
//! let response = gamequery::query(&request)?;
//! println!("{} ({}/{})", response.name, response.players.current, response.players.max);
//! # Ok::<(), gamequery::Error>(())
//! ```

mod dispatcher;
mod error;
#[cfg(test)]
mod mock;
mod packet;
mod protocol;
mod protocols;
mod request;
mod response;
mod transport;

pub use error::Error;
pub use packet::{ByteOrder, Packet};
pub use protocol::{Protocol, Registry};
pub use protocols::minecraft_tcp::{
    MinecraftTcp, MinecraftTcpDescription, MinecraftTcpPlayers, MinecraftTcpRaw,
    MinecraftTcpSamplePlayer, MinecraftTcpVersion,
};
pub use protocols::minecraft_udp::{MinecraftUdp, MinecraftUdpRaw};
pub use protocols::source::{Source, SourceA2SInfo, SourceExtraData};
pub use request::{Request, DEFAULT_TIMEOUT};
pub use response::{Players, RawResponse, Response};
pub use transport::{Network, NetworkTransport, Transport};

/// Queries `request.ip:request.port` (or the matched protocol's default
/// port, if `request.port` is `0`) using the protocol(s) registered under
/// `request.game`. If more than one protocol matches the name (`minecraft`
/// matches both the UDP and TCP engines), they race and the
/// highest-priority responder wins.
///
/// Returns [`Error::Lookup`] if `request.game` is unset or matches no
/// registered protocol.
pub fn query(request: &Request) -> Result<Response, Error> {
    let registry = Registry::default();
    dispatcher::query(&registry, request)
}

/// Races every registered protocol against `request.ip:request.port`,
/// ignoring `request.game`, and returns the winning response along with its
/// canonical protocol name. Useful when the game behind an address isn't
/// known ahead of time.
pub fn detect(request: &Request) -> Result<(Response, String), Error> {
    let registry = Registry::default();
    dispatcher::detect(&registry, request)
}
