//! Rank/size context and the in-process backend
//!
//! Every rank owns one [`Communicator`]. It tells the rank who it is, moves
//! local-best messages between ranks, and provides the closing barrier.
//!
//! [`LocalComm`] realizes a world of W ranks as W threads of one process:
//! each rank has one crossbeam inbox and a sender handle to every other
//! inbox, and all ranks share one `std::sync::Barrier`.

use super::protocol::LocalBestMessage;
use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver, Sender};
use std::collections::VecDeque;
use std::sync::{Arc, Barrier};

/// Rank context plus point-to-point messaging and a barrier
pub trait Communicator {
    /// This rank, in `0..size`
    fn rank(&self) -> usize;

    /// Number of ranks in the run
    fn size(&self) -> usize;

    /// Send a message to rank `dest`
    fn send(&mut self, dest: usize, msg: LocalBestMessage) -> Result<()>;

    /// Block until a message with `tag` arrives from any rank
    ///
    /// Messages with other tags are kept for later receives.
    fn recv_any(&mut self, tag: u32) -> Result<LocalBestMessage>;

    /// Block until every rank has called `barrier`
    fn barrier(&mut self) -> Result<()>;

    fn is_coordinator(&self) -> bool {
        self.rank() == 0
    }
}

/// Take the first pending message carrying `tag`
pub(crate) fn take_pending(
    pending: &mut VecDeque<LocalBestMessage>,
    tag: u32,
) -> Option<LocalBestMessage> {
    let pos = pending.iter().position(|m| m.tag == tag)?;
    pending.remove(pos)
}

/// One rank of an in-process world
pub struct LocalComm {
    rank: usize,
    inbox: Receiver<LocalBestMessage>,
    peers: Vec<Sender<LocalBestMessage>>,
    barrier: Arc<Barrier>,
    pending: VecDeque<LocalBestMessage>,
}

impl LocalComm {
    /// Create all `size` ranks of a world; element `r` is rank `r`
    pub fn create(size: usize) -> Vec<LocalComm> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..size).map(|_| channel::unbounded()).unzip();
        let barrier = Arc::new(Barrier::new(size));

        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| LocalComm {
                rank,
                inbox,
                peers: senders.clone(),
                barrier: Arc::clone(&barrier),
                pending: VecDeque::new(),
            })
            .collect()
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&mut self, dest: usize, msg: LocalBestMessage) -> Result<()> {
        let peer = self
            .peers
            .get(dest)
            .with_context(|| format!("Rank {} does not exist (size {})", dest, self.size()))?;
        peer.send(msg)
            .map_err(|_| anyhow::anyhow!("Rank {} has already exited", dest))
    }

    fn recv_any(&mut self, tag: u32) -> Result<LocalBestMessage> {
        if let Some(msg) = take_pending(&mut self.pending, tag) {
            return Ok(msg);
        }
        loop {
            // Our own sender in `peers` keeps the channel open, so this only
            // fails if the world is torn down underneath us
            let msg = self.inbox.recv().context("Inbox closed")?;
            if msg.tag == tag {
                return Ok(msg);
            }
            self.pending.push_back(msg);
        }
    }

    fn barrier(&mut self) -> Result<()> {
        self.barrier.wait();
        Ok(())
    }
}
