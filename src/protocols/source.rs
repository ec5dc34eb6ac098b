//! Valve Source engine A2S query (A2S_INFO, with a best-effort A2S_PLAYER
//! follow-up). Priority 1, default port 27015, canonical name `source`.

use crate::error::Error;
use crate::packet::{ByteOrder, Packet};
use crate::protocol::Protocol;
use crate::response::{Players, RawResponse, Response};
use crate::transport::{Network, Transport};

const QUERY_STRING: &str = "Source Engine Query";
const A2S_INFO_HEADER: u8 = 0x54;
const A2S_INFO_SUCCESS: u8 = 0x49;
const A2S_PLAYER_HEADER: u8 = 0x55;
const A2S_PLAYER_SUCCESS: u8 = 0x44;
const CHALLENGE_RESPONSE: u8 = 0x41;
const THE_SHIP_APP_ID: u16 = 2420;

/// Optional extra-data fields gated by the A2S_INFO EDF bitfield.
#[derive(Debug, Clone, Default)]
pub struct SourceExtraData {
    pub port: Option<u16>,
    pub steam_id: Option<u64>,
    pub sourcetv_port: Option<u16>,
    pub sourcetv_name: Option<String>,
    pub keywords: Option<String>,
    pub game_id: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SourceA2SInfo {
    pub protocol: u8,
    pub name: String,
    pub map: String,
    pub folder: String,
    pub game: String,
    pub id: u16,
    pub players: u8,
    pub max_players: u8,
    pub bots: u8,
    pub server_type: u8,
    pub environment: u8,
    pub visibility: u8,
    pub vac: u8,
    pub version: String,
    pub edf: Option<u8>,
    pub extra_data: SourceExtraData,
}

#[allow(dead_code)]
struct PartialPacket {
    id: i32,
    number: i8,
    size: u16,
    payload: Vec<u8>,
}

pub struct Source;

impl Protocol for Source {
    fn name(&self) -> &'static str {
        "source"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    fn default_port(&self) -> u16 {
        27015
    }

    fn priority(&self) -> u16 {
        1
    }

    fn network(&self) -> Network {
        Network::Udp
    }

    fn execute(&self, transport: &mut dyn Transport) -> Result<Response, Error> {
        let mut initial = vec![0xFF, 0xFF, 0xFF, 0xFF, A2S_INFO_HEADER];
        initial.extend_from_slice(QUERY_STRING.as_bytes());
        initial.push(0x00);

        let packet = challenge_round_trip(transport, &initial, A2S_INFO_SUCCESS)?;
        let info = parse_a2s_info_body(packet)?;

        let names = match try_a2s_player(transport) {
            Ok(names) => names,
            Err(err) => {
                log::debug!("A2S_PLAYER follow-up failed, leaving player names empty: {err}");
                Vec::new()
            }
        };

        let players = Players {
            current: info.players as i64,
            max: info.max_players as i64,
            names,
        };

        Ok(Response {
            name: info.name.clone(),
            players,
            raw: RawResponse::Source(info),
        })
    }
}

/// Reads one response packet, rewinding and reassembling it first if its
/// header marks it as a split response.
fn read_response_packet(transport: &mut dyn Transport) -> Result<Packet, Error> {
    let mut packet = transport.receive()?;
    packet.set_order(ByteOrder::Little);

    match packet.read_i32() {
        -1 => Ok(packet),
        -2 => {
            packet.forward(-4);
            reassemble_split_response(transport, packet)
        }
        _ => Err(Error::framing("unknown packet type")),
    }
}

/// Sends `initial_request`, then resolves a challenge (`0x41`) response by
/// resending the first five bytes of `initial_request` (the `FF FF FF FF`
/// header plus the query byte) followed by the 4-byte challenge token. A
/// second consecutive challenge is fatal.
fn challenge_round_trip(
    transport: &mut dyn Transport,
    initial_request: &[u8],
    success_byte: u8,
) -> Result<Packet, Error> {
    transport.send(initial_request)?;
    let mut packet = read_response_packet(transport)?;
    let mut response_type = packet.read_u8();
    let mut already_challenged = false;

    loop {
        if response_type == success_byte {
            return Ok(packet);
        }

        if response_type == CHALLENGE_RESPONSE {
            if already_challenged {
                return Err(Error::policy("disallowing challenge requests"));
            }
            already_challenged = true;

            let challenge = packet.read_raw(4);
            let mut retry = initial_request[..5].to_vec();
            retry.extend_from_slice(&challenge);

            transport.send(&retry)?;
            packet = read_response_packet(transport)?;
            response_type = packet.read_u8();
            continue;
        }

        return Err(Error::framing("unknown response type"));
    }
}

fn reassemble_split_response(
    transport: &mut dyn Transport,
    mut packet: Packet,
) -> Result<Packet, Error> {
    let mut parts: Vec<PartialPacket> = Vec::new();
    let mut compressed = false;
    let mut total: i8 = 0;
    let mut first = true;

    loop {
        if !first {
            packet = transport.receive()?;
            packet.set_order(ByteOrder::Little);
        }

        if packet.read_i32() != -2 {
            return Err(Error::framing("expected -2 split header"));
        }

        let id = packet.read_i32();
        let total_field = packet.read_i8();
        let number = packet.read_i8();
        let size = packet.read_u16();

        if first {
            total = total_field;
            compressed = (id as u32) & 0x8000_0000 != 0;
            if compressed {
                packet.read_i32(); // decompressed size, unused (bz2 unsupported)
                packet.read_i32(); // crc32, unused
            }
            first = false;
        }

        let payload = packet.read_rest();
        if packet.is_invalid() {
            return Err(Error::framing("split packet response was malformed"));
        }

        parts.push(PartialPacket {
            id,
            number,
            size,
            payload,
        });

        if parts.len() == total as usize {
            break;
        }
    }

    parts.sort_by_key(|p| p.number);

    let mut combined = Packet::new(ByteOrder::Little);
    for part in &parts {
        combined.write_raw(&part.payload);
    }

    if compressed {
        return Err(Error::semantic("bz2 compressed"));
    }

    combined.read_i32(); // strip the leading FF FF FF FF so parsing can continue as a simple response
    Ok(combined)
}

fn parse_a2s_info_body(mut packet: Packet) -> Result<SourceA2SInfo, Error> {
    let protocol = packet.read_u8();
    let name = packet.read_string();
    let map = packet.read_string();
    let folder = packet.read_string();
    let game = packet.read_string();
    let id = packet.read_u16();
    let players = packet.read_u8();
    let max_players = packet.read_u8();
    let bots = packet.read_u8();
    let server_type = packet.read_u8();
    let environment = packet.read_u8();
    let visibility = packet.read_u8();
    let vac = packet.read_u8();

    if id == THE_SHIP_APP_ID {
        return Err(Error::semantic("The Ship unsupported"));
    }

    let version = packet.read_string();

    let mut edf = None;
    let mut extra_data = SourceExtraData::default();

    if !packet.reached_end() {
        let edf_byte = packet.read_u8();
        edf = Some(edf_byte);

        if edf_byte & 0x80 != 0 {
            extra_data.port = Some(packet.read_u16());
        }
        if edf_byte & 0x10 != 0 {
            extra_data.steam_id = Some(packet.read_u64());
        }
        if edf_byte & 0x40 != 0 {
            extra_data.sourcetv_port = Some(packet.read_u16());
            extra_data.sourcetv_name = Some(packet.read_string());
        }
        if edf_byte & 0x20 != 0 {
            extra_data.keywords = Some(packet.read_string());
        }
        if edf_byte & 0x01 != 0 {
            extra_data.game_id = Some(packet.read_u64());
        }
    }

    if packet.is_invalid() {
        return Err(Error::semantic("received packet is invalid"));
    }

    Ok(SourceA2SInfo {
        protocol,
        name,
        map,
        folder,
        game,
        id,
        players,
        max_players,
        bots,
        server_type,
        environment,
        visibility,
        vac,
        version,
        edf,
        extra_data,
    })
}

fn try_a2s_player(transport: &mut dyn Transport) -> Result<Vec<String>, Error> {
    let initial = [
        0xFF, 0xFF, 0xFF, 0xFF, A2S_PLAYER_HEADER, 0xFF, 0xFF, 0xFF, 0xFF,
    ];
    let mut packet = challenge_round_trip(transport, &initial, A2S_PLAYER_SUCCESS)?;

    let count = packet.read_u8();
    let mut names = Vec::with_capacity(count as usize);

    loop {
        if packet.is_invalid() || packet.reached_end() {
            break;
        }

        let _index = packet.read_u8();
        let name = packet.read_string();
        let _score = packet.read_i32();
        let _duration = packet.read_f32();

        if packet.is_invalid() {
            break;
        }

        names.push(name);
    }

    Ok(names)
}
