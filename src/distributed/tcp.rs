//! Multi-process TCP backend
//!
//! Rank 0 binds the coordinator address and accepts one connection from each
//! other rank; the topology is a star, so non-zero ranks only ever talk to
//! rank 0. Each connection starts with a Hello/Welcome handshake that checks
//! protocol version, rank and world size.
//!
//! The communicator API is blocking. `TcpComm` owns a current-thread tokio
//! runtime and drives every network step through `block_on`; rank 0 reads
//! each peer connection in its own task and funnels the messages into a
//! single event channel, which gives "receive from any source" for free.
//!
//! Barrier: every non-zero rank sends `Barrier` and waits; rank 0 answers
//! with `Release` to all once it has reached the barrier itself and has seen
//! W-1 arrivals.

use super::comm::{take_pending, Communicator};
use super::protocol::{
    get_node_id, read_message, write_message, ErrorMessage, HelloMessage, LocalBestMessage, Message,
    PROTOCOL_VERSION,
};
use anyhow::{Context, Result};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

/// How long ranks wait for each other to show up
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// What rank 0's reader tasks report
#[derive(Debug)]
enum PeerEvent {
    Message(usize, Message),
    Closed(usize, String),
}

struct Peer {
    rank: usize,
    writer: OwnedWriteHalf,
}

enum Link {
    Root {
        peers: Vec<Peer>,
        events: mpsc::UnboundedReceiver<PeerEvent>,
        /// Ranks whose `Barrier` has arrived
        arrived: HashSet<usize>,
    },
    Member {
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
    },
}

/// One rank of a multi-process world
pub struct TcpComm {
    rank: usize,
    size: usize,
    runtime: Runtime,
    link: Link,
    pending: VecDeque<LocalBestMessage>,
}

impl TcpComm {
    /// Join the world as `rank` of `size`
    ///
    /// Rank 0 binds `addr` and returns once every other rank has completed
    /// the handshake; other ranks retry connecting to `addr` until rank 0 is
    /// listening.
    pub fn connect(rank: usize, size: usize, addr: &str) -> Result<Self> {
        if size == 0 || rank >= size {
            anyhow::bail!("Invalid rank {} for world size {}", rank, size);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create network runtime")?;

        let link = if rank == 0 {
            runtime.block_on(accept_ranks(addr, size))?
        } else {
            runtime.block_on(join_root(addr, rank, size))?
        };

        tracing::debug!(rank, size, addr, "communicator connected");

        Ok(Self {
            rank,
            size,
            runtime,
            link,
            pending: VecDeque::new(),
        })
    }
}

/// Rank 0: bind, then accept and greet `size - 1` ranks
async fn accept_ranks(addr: &str, size: usize) -> Result<Link> {
    let (tx, events) = mpsc::unbounded_channel();
    let mut peers: Vec<Peer> = Vec::with_capacity(size - 1);

    if size > 1 {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind coordinator address {}", addr))?;
        tracing::debug!(addr, expecting = size - 1, "waiting for ranks");

        while peers.len() < size - 1 {
            let (stream, remote) = tokio::time::timeout(CONNECT_TIMEOUT, listener.accept())
                .await
                .map_err(|_| {
                    anyhow::anyhow!(
                        "Timed out waiting for ranks ({} of {} connected)",
                        peers.len(),
                        size - 1
                    )
                })?
                .context("Failed to accept connection")?;
            let _ = stream.set_nodelay(true);

            let (mut reader, mut writer) = stream.into_split();
            let hello = match read_message(&mut reader).await? {
                Message::Hello(hello) => hello,
                other => anyhow::bail!("Expected Hello from {}, got {:?}", remote, other),
            };

            let known: Vec<usize> = peers.iter().map(|p| p.rank).collect();
            if let Err(e) = check_hello(&hello, size, &known) {
                let reject = Message::Error(ErrorMessage {
                    node_id: get_node_id(),
                    error: e.to_string(),
                });
                let _ = write_message(&mut writer, &reject).await;
                return Err(e.context(format!("Rejected connection from {}", remote)));
            }

            write_message(&mut writer, &Message::Welcome { size }).await?;
            tracing::debug!(rank = hello.rank, node = %hello.node_id, %remote, "rank joined");

            spawn_reader(hello.rank, reader, tx.clone());
            peers.push(Peer {
                rank: hello.rank,
                writer,
            });
        }
    }

    Ok(Link::Root {
        peers,
        events,
        arrived: HashSet::new(),
    })
}

fn check_hello(hello: &HelloMessage, size: usize, known: &[usize]) -> Result<()> {
    if hello.protocol_version != PROTOCOL_VERSION {
        anyhow::bail!(
            "Protocol version mismatch: rank {} speaks {}, rank 0 speaks {}",
            hello.rank,
            hello.protocol_version,
            PROTOCOL_VERSION
        );
    }
    if hello.size != size {
        anyhow::bail!(
            "World size mismatch: rank {} was started with {} ranks, rank 0 with {}",
            hello.rank,
            hello.size,
            size
        );
    }
    if hello.rank == 0 || hello.rank >= size {
        anyhow::bail!("Rank {} is out of range 1..{}", hello.rank, size);
    }
    if known.contains(&hello.rank) {
        anyhow::bail!("Rank {} connected twice", hello.rank);
    }
    Ok(())
}

fn spawn_reader(rank: usize, mut reader: OwnedReadHalf, tx: mpsc::UnboundedSender<PeerEvent>) {
    tokio::spawn(async move {
        loop {
            match read_message(&mut reader).await {
                Ok(msg) => {
                    if tx.send(PeerEvent::Message(rank, msg)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(PeerEvent::Closed(rank, format!("{:#}", e)));
                    break;
                }
            }
        }
    });
}

/// Rank k: connect to rank 0 (retrying) and complete the handshake
async fn join_root(addr: &str, rank: usize, size: usize) -> Result<Link> {
    let deadline = tokio::time::Instant::now() + CONNECT_TIMEOUT;
    let stream = loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => break stream,
            Err(e) if tokio::time::Instant::now() < deadline => {
                tracing::trace!(addr, error = %e, "rank 0 not reachable yet");
                tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to connect to rank 0 at {}", addr));
            }
        }
    };
    let _ = stream.set_nodelay(true);

    let (mut reader, mut writer) = stream.into_split();
    let hello = Message::Hello(HelloMessage {
        protocol_version: PROTOCOL_VERSION,
        rank,
        size,
        node_id: get_node_id(),
    });
    write_message(&mut writer, &hello).await?;

    match read_message(&mut reader)
        .await
        .context("No handshake reply from rank 0")?
    {
        Message::Welcome { size: root_size } if root_size == size => {}
        Message::Welcome { size: root_size } => anyhow::bail!(
            "World size mismatch: rank 0 has {} ranks, this rank has {}",
            root_size,
            size
        ),
        Message::Error(e) => anyhow::bail!("Rank 0 rejected this rank: {}", e.error),
        other => anyhow::bail!("Unexpected handshake reply: {:?}", other),
    }

    Ok(Link::Member { reader, writer })
}

/// Sort one event from a peer into pending messages or barrier arrivals
fn absorb_event(
    event: PeerEvent,
    pending: &mut VecDeque<LocalBestMessage>,
    arrived: &mut HashSet<usize>,
) -> Result<()> {
    match event {
        PeerEvent::Message(_, Message::LocalBest(msg)) => pending.push_back(msg),
        PeerEvent::Message(rank, Message::Barrier { .. }) => {
            arrived.insert(rank);
        }
        PeerEvent::Message(rank, Message::Error(e)) => {
            anyhow::bail!("Rank {} on {} failed: {}", rank, e.node_id, e.error)
        }
        PeerEvent::Message(rank, other) => {
            anyhow::bail!("Unexpected message from rank {}: {:?}", rank, other)
        }
        PeerEvent::Closed(rank, reason) => {
            anyhow::bail!("Lost connection to rank {}: {}", rank, reason)
        }
    }
    Ok(())
}

impl Communicator for TcpComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&mut self, dest: usize, msg: LocalBestMessage) -> Result<()> {
        if dest >= self.size {
            anyhow::bail!("Rank {} does not exist (size {})", dest, self.size);
        }
        if dest == self.rank {
            self.pending.push_back(msg);
            return Ok(());
        }

        let rank = self.rank;
        let Self { runtime, link, .. } = self;
        let sent = match link {
            Link::Root { peers, .. } => {
                let peer = peers
                    .iter_mut()
                    .find(|p| p.rank == dest)
                    .with_context(|| format!("Rank {} is not connected", dest))?;
                runtime.block_on(write_message(&mut peer.writer, &Message::LocalBest(msg)))
            }
            Link::Member { writer, .. } => {
                if dest != 0 {
                    anyhow::bail!("Rank {} can only send to rank 0, not rank {}", rank, dest);
                }
                runtime.block_on(write_message(writer, &Message::LocalBest(msg)))
            }
        };
        sent.with_context(|| format!("Failed to send to rank {}", dest))
    }

    fn recv_any(&mut self, tag: u32) -> Result<LocalBestMessage> {
        let Self {
            runtime,
            link,
            pending,
            ..
        } = self;

        loop {
            if let Some(msg) = take_pending(pending, tag) {
                return Ok(msg);
            }

            match link {
                Link::Root { events, arrived, .. } => {
                    let event = runtime
                        .block_on(events.recv())
                        .context("Every peer connection has closed")?;
                    absorb_event(event, pending, arrived)?;
                }
                Link::Member { reader, .. } => match runtime.block_on(read_message(reader))? {
                    Message::LocalBest(msg) => pending.push_back(msg),
                    Message::Error(e) => anyhow::bail!("Rank 0 failed: {}", e.error),
                    other => anyhow::bail!("Unexpected message from rank 0: {:?}", other),
                },
            }
        }
    }

    fn barrier(&mut self) -> Result<()> {
        let rank = self.rank;
        let size = self.size;
        let Self {
            runtime,
            link,
            pending,
            ..
        } = self;

        match link {
            Link::Root {
                peers,
                events,
                arrived,
            } => {
                while arrived.len() < size - 1 {
                    let event = runtime
                        .block_on(events.recv())
                        .context("Every peer connection has closed")?;
                    absorb_event(event, pending, arrived)?;
                }
                for peer in peers.iter_mut() {
                    runtime
                        .block_on(write_message(&mut peer.writer, &Message::Release))
                        .with_context(|| format!("Failed to release rank {}", peer.rank))?;
                }
                arrived.clear();
            }
            Link::Member { reader, writer } => {
                runtime
                    .block_on(write_message(writer, &Message::Barrier { rank }))
                    .context("Failed to enter barrier")?;
                loop {
                    match runtime.block_on(read_message(reader))? {
                        Message::Release => break,
                        Message::LocalBest(msg) => pending.push_back(msg),
                        Message::Error(e) => anyhow::bail!("Rank 0 failed: {}", e.error),
                        other => anyhow::bail!("Unexpected message in barrier: {:?}", other),
                    }
                }
            }
        }

        tracing::debug!(rank, "barrier released");
        Ok(())
    }
}

/// Find a free localhost port for a launched run
pub fn find_available_port() -> Result<u16> {
    let listener =
        std::net::TcpListener::bind(("127.0.0.1", 0)).context("Failed to find an available port")?;
    let port = listener.local_addr()?.port();
    tracing::debug!(port, "port is available");
    Ok(port)
}
