//! Minecraft's modern TCP status protocol ("Server List Ping"): a
//! handshake frame followed by a status request frame, answered with a
//! JSON status document. Priority 1, default port 25565, canonical name
//! `minecraft_tcp`, alias `minecraft`.

use serde::Deserialize;

use crate::error::Error;
use crate::packet::{ByteOrder, Packet};
use crate::protocol::Protocol;
use crate::response::{Players, RawResponse, Response};
use crate::transport::{Network, Transport};

const HANDSHAKE_NEXT_STATE_STATUS: i64 = 0x01;

#[derive(Debug, Clone, Deserialize)]
pub struct MinecraftTcpVersion {
    pub name: String,
    pub protocol: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinecraftTcpSamplePlayer {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinecraftTcpPlayers {
    pub max: i64,
    pub online: i64,
    #[serde(default)]
    pub sample: Vec<MinecraftTcpSamplePlayer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinecraftTcpDescription {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinecraftTcpRaw {
    pub version: MinecraftTcpVersion,
    pub players: MinecraftTcpPlayers,
    pub description: MinecraftTcpDescription,
    #[serde(default)]
    pub favicon: String,
}

/// An input to the frame builder. Unknown variants are never constructed by
/// this crate, but the match arm exists because the wire format's building
/// block (heterogeneous field lists) allows for it.
enum Field<'a> {
    Str(&'a str),
    Int(i64),
    U16(u16),
    Raw(&'a [u8]),
}

/// Builds one length-prefixed Minecraft TCP frame: `varint(len(inner))`
/// followed by `inner`, where `inner` is the concatenation of the encoded
/// fields (strings length-prefixed with a varint, ints as varints, u16 in
/// big-endian, raw bytes verbatim).
fn build_frame(fields: &[Field]) -> Packet {
    let mut inner = Packet::new(ByteOrder::Big);
    for field in fields {
        match field {
            Field::Str(s) => {
                inner.write_varint(s.len() as i64);
                inner.write_string(s);
            }
            Field::Int(n) => inner.write_varint(*n),
            Field::U16(n) => inner.write_u16(*n),
            Field::Raw(bytes) => inner.write_raw(bytes),
        }
    }

    let mut frame = Packet::new(ByteOrder::Big);
    frame.write_varint(inner.length() as i64);
    frame.write_raw(inner.buffer());
    frame
}

pub struct MinecraftTcp;

impl Protocol for MinecraftTcp {
    fn name(&self) -> &'static str {
        "minecraft_tcp"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["minecraft"]
    }

    fn default_port(&self) -> u16 {
        25565
    }

    fn priority(&self) -> u16 {
        1
    }

    fn network(&self) -> Network {
        Network::Tcp
    }

    fn execute(&self, transport: &mut dyn Transport) -> Result<Response, Error> {
        let handshake = build_frame(&[
            Field::Raw(&[0x00, 0x00]), // packet id 0, protocol version 0 (varint)
            Field::Str(transport.ip()),
            Field::U16(transport.port()),
            Field::Int(HANDSHAKE_NEXT_STATE_STATUS),
        ]);
        transport.send(handshake.buffer())?;

        let status_request = build_frame(&[Field::Raw(&[0x00])]);
        transport.send(status_request.buffer())?;

        let mut packet = transport.receive()?;
        packet.set_order(ByteOrder::Big);

        let packet_length = packet.read_varint();
        let packet_id = packet.read_varint();
        if packet_id != 0 {
            return Err(Error::semantic(
                "received something else than a status response",
            ));
        }

        if packet_id > packet_length {
            packet.read_varint(); // defensive: observed variant framing
        }

        packet.read_varint(); // JSON string length, redundant with read_string
        let json_body = packet.read_string();

        if packet.is_invalid() {
            return Err(Error::semantic("received packet is invalid"));
        }

        let raw: MinecraftTcpRaw = serde_json::from_str(&json_body)
            .map_err(|e| Error::framing(format!("invalid status JSON: {e}")))?;

        let names = raw
            .players
            .sample
            .iter()
            .map(|p| p.name.clone())
            .collect();
        let players = Players {
            current: raw.players.online,
            max: raw.players.max,
            names,
        };
        let name = raw.version.name.clone();

        Ok(Response {
            name,
            players,
            raw: RawResponse::MinecraftTcp(raw),
        })
    }
}
