use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};

use super::http::{self, Request};

/// Hard cap on concurrently open peers. Pending connections beyond the cap
/// stay in the listen backlog until a slot frees up.
pub const MAX_CLIENTS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerState {
    /// Accepted this tick, not yet polled.
    Connecting,
    Open,
    /// Request parked pending a host-side completion (render readback).
    AwaitingBody,
    Closed,
    Errored,
}

/// One accepted socket servicing exactly one request/response exchange.
pub struct PeerConnection {
    pub id: u64,
    stream: TcpStream,
    pub state: PeerState,
    buf: Vec<u8>,
}

/// What a dispatch callback decided to do with a request.
pub enum Outcome {
    Reply(serde_json::Value),
    /// Keep the peer open; the owner answers later via `resolve_parked`.
    Park,
}

/// Non-blocking one-shot command server. Owned by the tick loop: `poll`
/// runs once per frame and never blocks. Peers live in an arena that is
/// only compacted at the end of a poll, never while iterating.
pub struct CommandServer {
    listener: TcpListener,
    peers: Vec<PeerConnection>,
    next_peer_id: u64,
}

impl CommandServer {
    pub fn bind(port: u16) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            peers: Vec::new(),
            next_peer_id: 1,
        })
    }

    pub fn local_port(&self) -> u16 {
        self.listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or(0)
    }

    pub fn open_peers(&self) -> usize {
        self.peers.len()
    }

    pub fn has_parked(&self) -> bool {
        self.peers
            .iter()
            .any(|p| p.state == PeerState::AwaitingBody)
    }

    /// One scheduler tick: accept up to capacity, poll every live peer, and
    /// answer any peer whose buffered bytes form a request. The first
    /// non-empty read is treated as the complete request — slow-trickling
    /// peers are a known limitation of the protocol, not handled here.
    /// While a request is parked the server processes nothing else.
    pub fn poll<F>(&mut self, mut dispatch: F)
    where
        F: FnMut(&Request) -> Outcome,
    {
        if self.has_parked() {
            return;
        }

        while self.peers.len() < MAX_CLIENTS {
            match self.listener.accept() {
                Ok((stream, _)) => {
                    if stream.set_nonblocking(true).is_err() {
                        continue;
                    }
                    let id = self.next_peer_id;
                    self.next_peer_id += 1;
                    self.peers.push(PeerConnection {
                        id,
                        stream,
                        state: PeerState::Connecting,
                        buf: Vec::new(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }

        for peer in &mut self.peers {
            if !matches!(peer.state, PeerState::Connecting | PeerState::Open) {
                continue;
            }
            peer.state = PeerState::Open;

            let mut chunk = [0u8; 4096];
            loop {
                match peer.stream.read(&mut chunk) {
                    Ok(0) => {
                        peer.state = PeerState::Closed;
                        break;
                    }
                    Ok(n) => {
                        peer.buf.extend_from_slice(&chunk[..n]);
                        if n < chunk.len() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(_) => {
                        peer.state = PeerState::Errored;
                        break;
                    }
                }
            }
            if peer.state == PeerState::Errored {
                continue;
            }
            if peer.buf.is_empty() {
                if peer.state == PeerState::Closed {
                    // hung up without sending anything: empty frame, 400
                    let _ = peer.stream.write_all(&http::encode_bad_request());
                }
                continue;
            }

            match http::parse_request(&peer.buf) {
                Ok(request) => match dispatch(&request) {
                    Outcome::Reply(value) => {
                        let _ = peer.stream.write_all(&http::encode_ok(&value));
                        peer.state = PeerState::Closed;
                    }
                    Outcome::Park => {
                        peer.state = PeerState::AwaitingBody;
                    }
                },
                Err(_) => {
                    let _ = peer.stream.write_all(&http::encode_bad_request());
                    peer.state = PeerState::Closed;
                }
            }
        }

        // Deferred batch removal: never mutate the peer set mid-iteration.
        self.peers.retain(|p| {
            matches!(
                p.state,
                PeerState::Connecting | PeerState::Open | PeerState::AwaitingBody
            )
        });
    }

    /// Answer a peer previously parked by a `Park` outcome, then tear it
    /// down. The next poll compacts it out of the arena.
    pub fn resolve_parked(&mut self, id: u64, body: &serde_json::Value) {
        if let Some(peer) = self.peers.iter_mut().find(|p| p.id == id) {
            if peer.state == PeerState::AwaitingBody {
                let _ = peer.stream.write_all(&http::encode_ok(body));
                peer.state = PeerState::Closed;
            }
        }
    }

    /// Id of the currently parked peer, if any.
    pub fn parked_peer(&self) -> Option<u64> {
        self.peers
            .iter()
            .find(|p| p.state == PeerState::AwaitingBody)
            .map(|p| p.id)
    }
}
