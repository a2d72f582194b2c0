//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* whose length is carried by the
//! transport, so receives do not need to know the size in advance.
//! All handles are **waitable**; receive handles can also be polled, which is
//! what [`wait_any`] builds on.

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::task::Poll;

/// Non-blocking point-to-point communication interface.
pub trait Communicator: Send + Sync {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait + Test;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16) -> Self::RecvHandle;
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

/// Receive handles that can be polled without blocking.
pub trait Test {
    /// `Pending` while the message has not arrived; `Ready(None)` on failure.
    fn test(&mut self) -> Poll<Option<Vec<u8>>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Complete one of the pending receives in `handles`, whichever arrives first.
///
/// Completed slots are set to `None`. Returns `None` once every slot is empty.
pub fn wait_any<H: Test>(handles: &mut [Option<H>]) -> Option<(usize, Option<Vec<u8>>)> {
    loop {
        let mut pending = false;
        for (i, slot) in handles.iter_mut().enumerate() {
            if let Some(h) = slot {
                pending = true;
                if let Poll::Ready(data) = h.test() {
                    *slot = None;
                    return Some((i, data));
                }
            }
        }
        if !pending {
            return None;
        }
        std::thread::yield_now();
    }
}

/// Typed message tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommTag(u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        CommTag(tag)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Tag `k` slots after this one.
    pub const fn offset(self, k: u16) -> Self {
        CommTag(self.0.wrapping_add(k))
    }
}

/// Tags used by distributed coarsening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoarsenCommTags {
    pub request: CommTag,
    pub reply: CommTag,
    pub halo: CommTag,
    pub count: CommTag,
    pub data: CommTag,
    pub collective: CommTag,
}

impl CoarsenCommTags {
    pub const fn from_base(base: CommTag) -> Self {
        CoarsenCommTags {
            request: base,
            reply: base.offset(1),
            halo: base.offset(2),
            count: base.offset(3),
            data: base.offset(4),
            collective: base.offset(5),
        }
    }
}

impl Default for CoarsenCommTags {
    fn default() -> Self {
        Self::from_base(CommTag::new(0x4d00))
    }
}

/// Compile-time no-op comm for pure serial unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

/// Receive handle of [`NoComm`]; never yields data.
#[derive(Debug)]
pub struct NoRecv;

impl Wait for NoRecv {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Test for NoRecv {
    fn test(&mut self) -> Poll<Option<Vec<u8>>> {
        Poll::Ready(None)
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = NoRecv;

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16) -> NoRecv {
        NoRecv
    }
}

// --- ThreadComm: intra-process / multi-thread ---
type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Default)]
struct Mailbox {
    queues: DashMap<Key, VecDeque<Bytes>>,
    arrivals: Mutex<u64>,
    signal: Condvar,
}

impl Mailbox {
    fn post(&self, key: Key, data: Bytes) {
        self.queues.entry(key).or_default().push_back(data);
        let mut n = self.arrivals.lock();
        *n += 1;
        self.signal.notify_all();
    }

    fn pop(&self, key: &Key) -> Option<Bytes> {
        self.queues.get_mut(key).and_then(|mut q| q.pop_front())
    }
}

/// One rank of an in-process world whose ranks run on separate threads.
///
/// Messages between a pair of ranks with the same tag are delivered in
/// sending order.
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl ThreadComm {
    /// All ranks of a fresh world of `size` ranks, sharing one mailbox.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }
}

pub struct ThreadRecv {
    mailbox: Arc<Mailbox>,
    key: Key,
}

impl Wait for ThreadRecv {
    fn wait(self) -> Option<Vec<u8>> {
        let mut arrivals = self.mailbox.arrivals.lock();
        loop {
            if let Some(bytes) = self.mailbox.pop(&self.key) {
                return Some(bytes.to_vec());
            }
            self.mailbox.signal.wait(&mut arrivals);
        }
    }
}

impl Test for ThreadRecv {
    fn test(&mut self) -> Poll<Option<Vec<u8>>> {
        match self.mailbox.pop(&self.key) {
            Some(bytes) => Poll::Ready(Some(bytes.to_vec())),
            None => Poll::Pending,
        }
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = ThreadRecv;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        self.mailbox
            .post((self.rank, peer, tag), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16) -> ThreadRecv {
        ThreadRecv {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, tag),
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    pub struct MpiComm {
        pub world: SimpleCommunicator,
        _universe: mpi::environment::Universe,
        pub rank: usize,
        pub size: usize,
    }

    impl MpiComm {
        /// Initialize MPI and wrap the world communicator.
        pub fn new() -> Option<Self> {
            let universe = mpi::initialize()?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Some(Self {
                world,
                _universe: universe,
                rank,
                size,
            })
        }
    }

    /// Pending send; owns its buffer until the request completes.
    pub struct MpiSend {
        req: Request<'static, [u8], StaticScope>,
        buf: *mut [u8],
    }

    impl Wait for MpiSend {
        fn wait(self) -> Option<Vec<u8>> {
            self.req.wait();
            // SAFETY: `buf` came from `Box::into_raw` in `isend` and the only
            // borrow of it, held by the request, ended with `wait`.
            drop(unsafe { Box::from_raw(self.buf) });
            None
        }
    }

    pub struct MpiRecv {
        peer: i32,
        tag: i32,
    }

    impl Wait for MpiRecv {
        fn wait(self) -> Option<Vec<u8>> {
            let world = SimpleCommunicator::world();
            let (msg, _status) = world.process_at_rank(self.peer).matched_probe_with_tag(self.tag);
            let (data, _status) = msg.matched_receive_vec::<u8>();
            Some(data)
        }
    }

    impl Test for MpiRecv {
        fn test(&mut self) -> Poll<Option<Vec<u8>>> {
            let world = SimpleCommunicator::world();
            match world
                .process_at_rank(self.peer)
                .immediate_matched_probe_with_tag(self.tag)
            {
                Some((msg, _status)) => {
                    let (data, _status) = msg.matched_receive_vec::<u8>();
                    Poll::Ready(Some(data))
                }
                None => Poll::Pending,
            }
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSend;
        type RecvHandle = MpiRecv;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiSend {
            let raw: *mut [u8] = Box::into_raw(buf.to_vec().into_boxed_slice());
            // SAFETY: the allocation stays alive until `MpiSend::wait` frees it.
            let data: &'static [u8] = unsafe { &*raw };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, data, tag as i32);
            MpiSend { req, buf: raw }
        }

        fn irecv(&self, peer: usize, tag: u16) -> MpiRecv {
            MpiRecv {
                peer: peer as i32,
                tag: tag as i32,
            }
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
