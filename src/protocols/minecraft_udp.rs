//! Minecraft's legacy GameSpy-derived UDP query protocol ("Full Stat").
//! Priority 10 (it beats the TCP status protocol when both race), default
//! port 25565, canonical name `minecraft_udp`, alias `minecraft`.

use rand::Rng;

use crate::error::Error;
use crate::packet::{ByteOrder, Packet};
use crate::protocol::Protocol;
use crate::response::{Players, RawResponse, Response};
use crate::transport::{Network, Transport};

const HANDSHAKE_TYPE: u8 = 0x09;
const STAT_TYPE: u8 = 0x00;
/// `splitnum\0\x80\x00`
const STAT_PADDING: usize = 11;
/// `\x01player_\x00\x00`
const PLAYER_SECTION_PADDING: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct MinecraftUdpRaw {
    pub hostname: String,
    pub gametype: String,
    pub game_id: String,
    pub version: String,
    pub plugins: String,
    pub map: String,
    pub numplayers: u16,
    pub maxplayers: u16,
    pub hostport: u16,
    pub hostip: String,
    pub players: Vec<String>,
}

pub struct MinecraftUdp;

impl Protocol for MinecraftUdp {
    fn name(&self) -> &'static str {
        "minecraft_udp"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["minecraft"]
    }

    fn default_port(&self) -> u16 {
        25565
    }

    fn priority(&self) -> u16 {
        10
    }

    fn network(&self) -> Network {
        Network::Udp
    }

    fn execute(&self, transport: &mut dyn Transport) -> Result<Response, Error> {
        // Worker-local RNG: never share a seed or generator across
        // concurrently dispatched protocols.
        let session_id: i32 = rand::thread_rng().gen::<i32>() & 0x0F0F_0F0F;

        let mut handshake = Packet::new(ByteOrder::Big);
        handshake.write_raw(&[0xFE, 0xFD, 0x09]);
        handshake.write_i32(session_id);
        transport.send(handshake.buffer())?;

        let mut handshake_response = transport.receive()?;
        handshake_response.set_order(ByteOrder::Big);

        if handshake_response.read_u8() != HANDSHAKE_TYPE {
            return Err(Error::framing(
                "sent a handshake, but didn't receive handshake response back",
            ));
        }
        if handshake_response.read_i32() != session_id {
            return Err(Error::framing("received handshake for wrong session id"));
        }

        let challenge_token = handshake_response.read_string();
        let challenge = parse_challenge_token(&challenge_token)?;

        let mut stat_request = Packet::new(ByteOrder::Big);
        stat_request.write_raw(&[0xFE, 0xFD, 0x00]);
        stat_request.write_i32(session_id);
        stat_request.write_raw(&challenge);
        stat_request.write_raw(&[0x00, 0x00, 0x00, 0x00]);
        transport.send(stat_request.buffer())?;

        let mut stat_response = transport.receive()?;
        stat_response.set_order(ByteOrder::Big);

        if stat_response.read_u8() != STAT_TYPE {
            return Err(Error::framing(
                "sent a full stat request, but didn't receive stat response back",
            ));
        }
        if stat_response.read_i32() != session_id {
            return Err(Error::framing("received handshake for wrong session id"));
        }

        stat_response.forward(STAT_PADDING as isize);

        let mut raw = MinecraftUdpRaw::default();
        loop {
            let key = stat_response.read_string();
            if key.is_empty() {
                break;
            }
            let value = stat_response.read_string();

            match key.as_str() {
                "hostname" => raw.hostname = value,
                "gametype" => raw.gametype = value,
                "game_id" => raw.game_id = value,
                "version" => raw.version = value,
                "plugins" => raw.plugins = value,
                "map" => raw.map = value,
                "numplayers" => raw.numplayers = value.parse().unwrap_or(0),
                "maxplayers" => raw.maxplayers = value.parse().unwrap_or(0),
                "hostport" => raw.hostport = value.parse().unwrap_or(0),
                "hostip" => raw.hostip = value,
                other => log::trace!("ignoring unknown Minecraft UDP stat key {other:?}"),
            }
        }

        stat_response.forward(PLAYER_SECTION_PADDING as isize);

        loop {
            let player = stat_response.read_string();
            if player.is_empty() {
                break;
            }
            raw.players.push(player);
        }

        if stat_response.is_invalid() {
            return Err(Error::semantic("received packet is invalid"));
        }

        let players = Players {
            current: raw.numplayers as i64,
            max: raw.maxplayers as i64,
            names: raw.players.clone(),
        };
        let name = raw.hostname.clone();

        Ok(Response {
            name,
            players,
            raw: RawResponse::MinecraftUdp(raw),
        })
    }
}

/// Parses the NUL-terminated ASCII decimal challenge token and re-encodes
/// it as 4 big-endian bytes.
fn parse_challenge_token(token: &str) -> Result<[u8; 4], Error> {
    let parsed: i32 = token
        .parse()
        .map_err(|_| Error::framing(format!("invalid challenge token {token:?}")))?;
    Ok(parsed.to_be_bytes())
}
