//! Races a set of candidate protocols against one endpoint and selects a
//! winner by priority. One OS thread per candidate, joined before
//! selection — there is no early exit, so `detect` always completes in at
//! most one timeout's worth of wall time per racing protocol.

use std::thread;

use crate::error::Error;
use crate::protocol::{Protocol, Registry};
use crate::request::Request;
use crate::response::Response;
use crate::transport::{NetworkTransport, Transport};

struct WorkerResult {
    priority: u16,
    name: &'static str,
    outcome: Result<Response, Error>,
}

/// Opens the transport a worker will drive its protocol over. Parameterized
/// so tests can hand `race` an in-memory opener instead of reaching for a
/// real socket, while `query`/`detect` use `default_open` underneath.
type Opener = dyn Fn(&dyn Protocol, &Request) -> Result<Box<dyn Transport>, Error> + Sync;

fn default_open(protocol: &dyn Protocol, request: &Request) -> Result<Box<dyn Transport>, Error> {
    let port = request.resolved_port(protocol.default_port());
    let timeout = request.resolved_timeout();
    NetworkTransport::open(protocol.network(), &request.ip, port, timeout)
        .map(|transport| Box::new(transport) as Box<dyn Transport>)
}

fn run_worker(protocol: &dyn Protocol, request: &Request, open: &Opener) -> WorkerResult {
    let outcome = open(protocol, request).and_then(|mut transport| {
        let result = protocol.execute(transport.as_mut());
        let _ = transport.close();
        result
    });

    if let Err(ref err) = outcome {
        log::debug!(
            "protocol {} failed against {}:{}: {err}",
            protocol.name(),
            request.ip,
            request.resolved_port(protocol.default_port()),
        );
    }

    WorkerResult {
        priority: protocol.priority(),
        name: protocol.name(),
        outcome,
    }
}

/// Runs every candidate protocol concurrently against `request` on its own
/// scoped thread, joins all of them, then returns the highest-priority
/// success — or, if none succeeded, the error belonging to the
/// highest-priority failure. `thread::scope` lets each worker borrow
/// `request` and its `&dyn Protocol` directly instead of requiring `'static`
/// ownership, since the scope guarantees every thread finishes before it
/// returns.
fn race(
    candidates: Vec<&dyn Protocol>,
    request: &Request,
    open: &Opener,
) -> Result<(Response, String), Error> {
    let mut results: Vec<WorkerResult> = thread::scope(|scope| {
        let handles: Vec<_> = candidates
            .into_iter()
            .map(|protocol| scope.spawn(|| run_worker(protocol, request, open)))
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("protocol worker thread panicked"))
            .collect()
    });

    // Stable sort: registration order (the order `candidates` was built in)
    // breaks ties between protocols of equal priority.
    results.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut first_error: Option<Error> = None;
    for result in results {
        match result.outcome {
            Ok(response) => return Ok((response, result.name.to_string())),
            Err(err) => {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    Err(first_error.expect("race called with no candidates"))
}

/// Looks up protocols matching `request.game` and races them. Requires
/// `request.game` to be set.
pub fn query(registry: &Registry, request: &Request) -> Result<Response, Error> {
    let game = request
        .game
        .as_deref()
        .ok_or_else(|| Error::lookup("could not find protocols for the game"))?;

    let candidates = registry.find(game);
    if candidates.is_empty() {
        return Err(Error::lookup("could not find protocols for the game"));
    }

    race(candidates, request, &default_open).map(|(response, _name)| response)
}

/// Races every registered protocol against `request`, ignoring
/// `request.game`, and returns the winner alongside its canonical name.
pub fn detect(registry: &Registry, request: &Request) -> Result<(Response, String), Error> {
    let candidates: Vec<&dyn Protocol> = registry.all().iter().map(|p| p.as_ref()).collect();
    race(candidates, request, &default_open)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MinecraftUdpEcho, ScriptedTransport};
    use crate::packet::{ByteOrder, Packet};
    use crate::response::{Players, RawResponse};

    // `race` opens a real transport via `run_worker`, which this module
    // can't do without a socket. These tests instead exercise the
    // priority-selection logic directly against synthetic `WorkerResult`s,
    // matching exactly what `race` does once every worker has reported in.
    fn select(mut results: Vec<WorkerResult>) -> Result<(Response, String), Error> {
        results.sort_by(|a, b| b.priority.cmp(&a.priority));
        let mut first_error: Option<Error> = None;
        for result in results {
            match result.outcome {
                Ok(response) => return Ok((response, result.name.to_string())),
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        Err(first_error.expect("no candidates"))
    }

    fn succeed(name: &'static str) -> Result<Response, Error> {
        Ok(Response {
            name: name.to_string(),
            players: Players::default(),
            raw: RawResponse::MinecraftUdp(Default::default()),
        })
    }

    #[test]
    fn higher_priority_success_wins_even_if_registered_later() {
        let results = vec![
            WorkerResult {
                priority: 1,
                name: "low",
                outcome: succeed("low"),
            },
            WorkerResult {
                priority: 10,
                name: "high",
                outcome: succeed("high"),
            },
        ];
        let (response, winner) = select(results).unwrap();
        assert_eq!(winner, "high");
        assert_eq!(response.name, "high");
    }

    #[test]
    fn equal_priority_ties_break_by_registration_order() {
        let results = vec![
            WorkerResult {
                priority: 1,
                name: "first",
                outcome: succeed("first"),
            },
            WorkerResult {
                priority: 1,
                name: "second",
                outcome: succeed("second"),
            },
        ];
        let (_, winner) = select(results).unwrap();
        assert_eq!(winner, "first");
    }

    #[test]
    fn no_successes_returns_highest_priority_failure() {
        let results = vec![
            WorkerResult {
                priority: 1,
                name: "low",
                outcome: Err(Error::semantic("low failed")),
            },
            WorkerResult {
                priority: 10,
                name: "high",
                outcome: Err(Error::semantic("high failed")),
            },
        ];
        let err = select(results).unwrap_err();
        assert_eq!(err.to_string(), "high failed");
    }

    #[test]
    fn query_without_game_set_is_a_lookup_error() {
        let registry = Registry::default();
        let request = Request::new("127.0.0.1");
        let err = query(&registry, &request).unwrap_err();
        assert_eq!(err.to_string(), "could not find protocols for the game");
    }

    #[test]
    fn query_with_unknown_game_is_a_lookup_error() {
        let registry = Registry::default();
        let request = Request::new("127.0.0.1").game("nonexistent-game");
        let err = query(&registry, &request).unwrap_err();
        assert_eq!(err.to_string(), "could not find protocols for the game");
    }

    /// Scenario 7: drives the real `race` function — real `thread::scope`
    /// fan-out, real `run_worker`, real protocol engines — against an
    /// injected in-memory opener standing in for `NetworkTransport::open`.
    /// `source` fails outright, `minecraft_tcp` succeeds, and `minecraft_udp`
    /// also succeeds; `minecraft_udp` must still win because its priority
    /// (10) beats `minecraft_tcp`'s (1).
    fn minecraft_tcp_success_frame() -> Vec<u8> {
        let json = r#"{"version":{"name":"1.20","protocol":763},"players":{"max":100,"online":7,"sample":[{"name":"carol","id":"00000000-0000-0000-0000-000000000000"}]},"description":{"text":"hi"},"favicon":""}"#;

        let mut inner = Packet::new(ByteOrder::Big);
        inner.write_varint(0);
        inner.write_varint(json.len() as i64);
        inner.write_string(json);

        let mut frame = Packet::new(ByteOrder::Big);
        frame.write_varint(inner.length() as i64);
        frame.write_raw(inner.buffer());
        frame.buffer().to_vec()
    }

    #[test]
    fn race_picks_minecraft_udp_over_a_concurrently_succeeding_minecraft_tcp() {
        let registry = Registry::default();
        let candidates: Vec<&dyn Protocol> = registry.all().iter().map(|p| p.as_ref()).collect();
        let request = Request::new("127.0.0.1");

        let minecraft_tcp_frame = minecraft_tcp_success_frame();

        let open = move |protocol: &dyn Protocol, _request: &Request| -> Result<Box<dyn Transport>, Error> {
            match protocol.name() {
                "source" => Ok(Box::new(ScriptedTransport::new(vec![])) as Box<dyn Transport>),
                "minecraft_udp" => Ok(Box::new(MinecraftUdpEcho::new()) as Box<dyn Transport>),
                "minecraft_tcp" => Ok(Box::new(ScriptedTransport::new(vec![minecraft_tcp_frame.clone()]))
                    as Box<dyn Transport>),
                other => panic!("no fixture registered for protocol {other}"),
            }
        };

        let (response, winner) = race(candidates, &request, &open).unwrap();
        assert_eq!(winner, "minecraft_udp");
        assert_eq!(response.name, "A Minecraft Server");
    }

    #[test]
    fn race_falls_back_to_only_successful_protocol() {
        let registry = Registry::default();
        let candidates: Vec<&dyn Protocol> = registry.all().iter().map(|p| p.as_ref()).collect();
        let request = Request::new("127.0.0.1");

        let minecraft_tcp_frame = minecraft_tcp_success_frame();

        let open = move |protocol: &dyn Protocol, _request: &Request| -> Result<Box<dyn Transport>, Error> {
            match protocol.name() {
                "source" => Ok(Box::new(ScriptedTransport::new(vec![])) as Box<dyn Transport>),
                "minecraft_udp" => {
                    Err(Error::framing("no scripted Minecraft UDP server for this test"))
                }
                "minecraft_tcp" => Ok(Box::new(ScriptedTransport::new(vec![minecraft_tcp_frame.clone()]))
                    as Box<dyn Transport>),
                other => panic!("no fixture registered for protocol {other}"),
            }
        };

        let (response, winner) = race(candidates, &request, &open).unwrap();
        assert_eq!(winner, "minecraft_tcp");
        assert_eq!(response.name, "1.20");
    }
}
