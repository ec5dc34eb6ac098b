//! In-memory [`Transport`] used by protocol-engine unit tests so the
//! byte-exact scenarios in the design's testable-properties section run
//! without a real socket. Not compiled outside of tests.
#![cfg(test)]

use std::collections::VecDeque;

use crate::error::Error;
use crate::packet::{ByteOrder, Packet};
use crate::transport::Transport;

/// Plays back a fixed queue of responses and records every `send`.
pub(crate) struct ScriptedTransport {
    sends: Vec<Vec<u8>>,
    responses: VecDeque<Vec<u8>>,
}

impl ScriptedTransport {
    pub(crate) fn new(responses: Vec<Vec<u8>>) -> Self {
        Self {
            sends: Vec::new(),
            responses: responses.into(),
        }
    }

    pub(crate) fn sends(&self) -> &[Vec<u8>] {
        &self.sends
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.sends.push(bytes.to_vec());
        Ok(())
    }

    fn receive(&mut self) -> Result<Packet, Error> {
        let bytes = self
            .responses
            .pop_front()
            .ok_or_else(|| Error::framing("no more scripted responses"))?;
        let mut packet = Packet::new(ByteOrder::Little);
        packet.set_buffer(bytes);
        Ok(packet)
    }

    fn close(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn ip(&self) -> &str {
        "127.0.0.1"
    }

    fn port(&self) -> u16 {
        0
    }
}

/// Echoes back whichever session id the Minecraft UDP engine used in its
/// handshake, then serves the scenario 5 fixture stat response (hostname
/// "A Minecraft Server", 2/20 players, "alice"/"bob"). Shared by the
/// `minecraft_udp` engine's own unit test and the dispatcher's race test,
/// since both need a Minecraft UDP server that plays along with whatever
/// random session id the engine drew.
pub(crate) struct MinecraftUdpEcho {
    step: usize,
    session_id: i32,
}

impl MinecraftUdpEcho {
    pub(crate) fn new() -> Self {
        Self {
            step: 0,
            session_id: 0,
        }
    }
}

impl Transport for MinecraftUdpEcho {
    fn send(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if self.step == 0 {
            self.session_id = i32::from_be_bytes(bytes[3..7].try_into().unwrap());
        }
        self.step += 1;
        Ok(())
    }

    fn receive(&mut self) -> Result<Packet, Error> {
        let mut packet = Packet::new(ByteOrder::Big);
        if self.step == 1 {
            packet.set_buffer(bytes(&[
                &[0x09],
                &self.session_id.to_be_bytes(),
                &cstr("9513307"),
            ]));
        } else {
            // 11 bytes of stat-section padding, 10 bytes of player-section
            // padding — matches the `minecraft_udp` engine's own constants.
            let mut body = bytes(&[&[0x00], &self.session_id.to_be_bytes(), &[0u8; 11]]);
            body.extend_from_slice(&cstr("hostname"));
            body.extend_from_slice(&cstr("A Minecraft Server"));
            body.extend_from_slice(&cstr("numplayers"));
            body.extend_from_slice(&cstr("2"));
            body.extend_from_slice(&cstr("maxplayers"));
            body.extend_from_slice(&cstr("20"));
            body.push(0);
            body.extend_from_slice(&[0u8; 10]);
            body.extend_from_slice(&cstr("alice"));
            body.extend_from_slice(&cstr("bob"));
            body.push(0);
            packet.set_buffer(body);
        }
        Ok(packet)
    }

    fn close(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn ip(&self) -> &str {
        "127.0.0.1"
    }

    fn port(&self) -> u16 {
        0
    }
}

/// Concatenates byte slices and string literals (as raw UTF-8, no implicit
/// NUL) into one owned buffer — a small builder for hand-assembling wire
/// fixtures in tests.
pub(crate) fn bytes(parts: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

/// A NUL-terminated string, as used throughout the Source and Minecraft UDP
/// wire formats.
pub(crate) fn cstr(s: &str) -> Vec<u8> {
    let mut out = s.as_bytes().to_vec();
    out.push(0);
    out
}
