//! Communicator abstraction for SPMD block-parallel runs.
//!
//! The grid and the solidification recorder only need two collectives: a
//! paired slab exchange with a Cartesian neighbor and a component-wise
//! min/max all-reduce. The trait keeps that seam narrow so the transport can
//! be swapped without touching the solver. [`SerialComm`] is the single-rank
//! implementation used by the standalone driver; [`ThreadedComm`] runs one
//! rank per thread inside a process, connected by unbounded channels.

use std::cell::RefCell;
use std::collections::VecDeque;

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Message tags below this value are reserved for halo exchange (one tag per
/// axis); reductions use this dedicated tag.
const TAG_REDUCE: u64 = u64::MAX;

/// Collective communication between the ranks of one simulation.
///
/// A failed collective (a peer disappearing mid-exchange) is fatal and
/// panics; there is no rank-local recovery.
pub trait Communicator: Send {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Send `payload` to `peer` and receive the matching payload `peer` sent
    /// to this rank under the same tag. Self-exchanges return the payload
    /// unchanged.
    fn exchange(&self, peer: usize, tag: u64, payload: Vec<f64>) -> Vec<f64>;

    /// Component-wise minimum across all ranks.
    fn all_reduce_min(&self, values: [f64; 3]) -> [f64; 3];

    /// Component-wise maximum across all ranks.
    fn all_reduce_max(&self, values: [f64; 3]) -> [f64; 3];
}

/// Single-rank communicator. Exchanges are self-sends and reductions are
/// identities.
#[derive(Debug, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn exchange(&self, _peer: usize, _tag: u64, payload: Vec<f64>) -> Vec<f64> {
        payload
    }

    fn all_reduce_min(&self, values: [f64; 3]) -> [f64; 3] {
        values
    }

    fn all_reduce_max(&self, values: [f64; 3]) -> [f64; 3] {
        values
    }
}

struct Message {
    from: usize,
    tag: u64,
    payload: Vec<f64>,
}

/// In-process communicator: one instance per rank thread, connected by an
/// unbounded channel mesh. Sends never block; receives block until the
/// matching message arrives. Messages from one sender arrive in order, so
/// matching on `(from, tag)` with a pending queue is sufficient to sort out
/// interleavings from different peers.
pub struct ThreadedComm {
    rank: usize,
    peers: Vec<Sender<Message>>,
    inbox: Receiver<Message>,
    pending: RefCell<VecDeque<Message>>,
}

impl ThreadedComm {
    /// Create a fully-connected mesh of `size` communicators, one to move
    /// onto each rank thread. The returned vector is indexed by rank.
    pub fn split(size: usize) -> Vec<ThreadedComm> {
        assert!(size > 0, "communicator size must be positive");

        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..size).map(|_| unbounded::<Message>()).unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ThreadedComm {
                rank,
                peers: senders.clone(),
                inbox,
                pending: RefCell::new(VecDeque::new()),
            })
            .collect()
    }

    fn send_to(&self, peer: usize, tag: u64, payload: Vec<f64>) {
        self.peers[peer]
            .send(Message {
                from: self.rank,
                tag,
                payload,
            })
            .expect("communicator peer hung up during send");
    }

    fn recv_matching(&self, from: usize, tag: u64) -> Vec<f64> {
        let mut pending = self.pending.borrow_mut();
        if let Some(pos) = pending.iter().position(|m| m.from == from && m.tag == tag) {
            return pending.remove(pos).expect("position is in range").payload;
        }
        loop {
            let message = self
                .inbox
                .recv()
                .expect("communicator peer hung up during receive");
            if message.from == from && message.tag == tag {
                return message.payload;
            }
            pending.push_back(message);
        }
    }

    fn all_reduce(&self, values: [f64; 3], op: fn(f64, f64) -> f64) -> [f64; 3] {
        if self.peers.len() == 1 {
            return values;
        }
        if self.rank == 0 {
            let mut acc = values;
            for peer in 1..self.peers.len() {
                let contribution = self.recv_matching(peer, TAG_REDUCE);
                for d in 0..3 {
                    acc[d] = op(acc[d], contribution[d]);
                }
            }
            for peer in 1..self.peers.len() {
                self.send_to(peer, TAG_REDUCE, acc.to_vec());
            }
            acc
        } else {
            self.send_to(0, TAG_REDUCE, values.to_vec());
            let reduced = self.recv_matching(0, TAG_REDUCE);
            [reduced[0], reduced[1], reduced[2]]
        }
    }
}

impl Communicator for ThreadedComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn exchange(&self, peer: usize, tag: u64, payload: Vec<f64>) -> Vec<f64> {
        if peer == self.rank {
            return payload;
        }
        self.send_to(peer, tag, payload);
        self.recv_matching(peer, tag)
    }

    fn all_reduce_min(&self, values: [f64; 3]) -> [f64; 3] {
        self.all_reduce(values, f64::min)
    }

    fn all_reduce_max(&self, values: [f64; 3]) -> [f64; 3] {
        self.all_reduce(values, f64::max)
    }
}
