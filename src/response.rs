use crate::protocols::minecraft_tcp::MinecraftTcpRaw;
use crate::protocols::minecraft_udp::MinecraftUdpRaw;
use crate::protocols::source::SourceA2SInfo;

/// Player counts and, where the protocol makes them available, names.
/// `names` may be a proper subset of, or empty relative to, `current` —
/// that is protocol-dependent and is not itself an error condition.
#[derive(Debug, Clone, Default)]
pub struct Players {
    pub current: i64,
    pub max: i64,
    pub names: Vec<String>,
}

/// The protocol-native record behind a normalized [`Response`].
#[derive(Debug, Clone)]
pub enum RawResponse {
    Source(SourceA2SInfo),
    MinecraftUdp(MinecraftUdpRaw),
    MinecraftTcp(MinecraftTcpRaw),
}

/// A normalized view of a game server's status, alongside the
/// protocol-native raw record it was derived from.
#[derive(Debug, Clone)]
pub struct Response {
    pub name: String,
    pub players: Players,
    pub raw: RawResponse,
}
