//! State shared by every logical process of a universe.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::alloc::Allocator;
use crate::collective::{AbortCause, AbortSignal, Rendezvous};
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};

/// A communication context: an ordered member list plus the rendezvous its
/// collectives meet in.
pub(crate) struct Context {
    pub(crate) id: u64,
    /// World ranks of the members, indexed by rank in this context.
    pub(crate) members: Arc<[i32]>,
    pub(crate) rendezvous: Rendezvous,
}

impl Context {
    fn new(id: u64, members: Arc<[i32]>) -> Self {
        let rendezvous = Rendezvous::new(members.len());
        Context {
            id,
            members,
            rendezvous,
        }
    }

    pub(crate) fn size(&self) -> i32 {
        self.rendezvous.size() as i32
    }
}

/// Shared runtime of one universe.
pub(crate) struct Runtime {
    pub(crate) config: RuntimeConfig,
    pub(crate) world: Arc<Context>,
    /// One single-member context per world rank (`MPI_COMM_SELF`).
    pub(crate) selves: Vec<Arc<Context>>,
    pub(crate) allocator: Allocator,
    pub(crate) abort: AbortSignal,
    started: Instant,
    next_context: AtomicU64,
    next_window: AtomicU64,
    next_keyval: AtomicI32,
    keyvals: Mutex<HashSet<i32>>,
}

impl Runtime {
    pub(crate) fn new(size: usize, config: RuntimeConfig) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidArgument(
                "a universe needs at least one process".into(),
            ));
        }
        let size = i32::try_from(size)
            .map_err(|_| Error::InvalidArgument(format!("universe size {size} is too large")))?;

        let world = Arc::new(Context::new(0, (0..size).collect()));
        let selves = (0..size)
            .map(|rank| Arc::new(Context::new(1 + rank as u64, Arc::from(vec![rank]))))
            .collect();

        Ok(Runtime {
            config,
            world,
            selves,
            allocator: Allocator::new(),
            abort: AbortSignal::default(),
            started: Instant::now(),
            next_context: AtomicU64::new(1 + size as u64),
            next_window: AtomicU64::new(0),
            next_keyval: AtomicI32::new(1),
            keyvals: Mutex::new(HashSet::new()),
        })
    }

    /// Build a fresh context over `members`.
    pub(crate) fn new_context(&self, members: Arc<[i32]>) -> Arc<Context> {
        let id = self.next_context.fetch_add(1, Ordering::Relaxed);
        Arc::new(Context::new(id, members))
    }

    pub(crate) fn next_window_id(&self) -> u64 {
        self.next_window.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn create_keyval(&self) -> i32 {
        let keyval = self.next_keyval.fetch_add(1, Ordering::Relaxed);
        self.keyvals.lock().insert(keyval);
        keyval
    }

    /// Remove a user keyval. Returns `false` if it was not live.
    pub(crate) fn free_keyval(&self, keyval: i32) -> bool {
        self.keyvals.lock().remove(&keyval)
    }

    pub(crate) fn is_live_keyval(&self, keyval: i32) -> bool {
        self.keyvals.lock().contains(&keyval)
    }

    /// The error reported for a lookup with an unknown attribute key.
    pub(crate) fn unknown_key(&self, keyval: i32) -> Error {
        Error::UnknownKey {
            keyval,
            reported: self.config.vendor.unknown_keyval_class(),
        }
    }

    /// Seconds elapsed since the universe was created.
    pub(crate) fn elapsed(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Abort the whole universe and terminate the calling logical process.
    pub(crate) fn abort(&self, rank: i32, reason: String) -> ! {
        log::error!("rank {rank} aborting the universe: {reason}");
        self.abort.raise(AbortCause::Fatal {
            rank,
            reason: reason.clone(),
        });
        panic!("MPI_ERRORS_ARE_FATAL: rank {rank}: {reason}");
    }
}
