//! Communicators.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::Result;
use crate::group::Group;
use crate::runtime::{Context, Runtime};

/// A communicator.
///
/// A communicator binds a group of processes to a communication context.
/// Collective calls (`barrier`, `duplicate`, window creation) must be made by
/// every member in the same order.
///
/// # Example
///
/// ```
/// use ferrorma::Universe;
///
/// let universe = Universe::new(3).unwrap();
/// universe
///     .run(|mpi| {
///         let world = mpi.world();
///         println!("I am rank {} of {}", world.rank(), world.size());
///         world.barrier().unwrap();
///     })
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct Communicator {
    context: Arc<Context>,
    runtime: Arc<Runtime>,
    rank: i32,
    /// Marker to prevent Send/Sync (a communicator handle belongs to one process)
    _marker: PhantomData<*mut ()>,
}

impl Communicator {
    pub(crate) fn new(runtime: Arc<Runtime>, context: Arc<Context>, rank: i32) -> Self {
        Communicator {
            context,
            runtime,
            rank,
            _marker: PhantomData,
        }
    }

    pub(crate) fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub(crate) fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Get the raw context identifier (for diagnostics).
    pub fn raw_handle(&self) -> u64 {
        self.context.id
    }

    /// Get the rank of the calling process in this communicator.
    pub fn rank(&self) -> i32 {
        self.rank
    }

    /// Get the number of processes in this communicator.
    pub fn size(&self) -> i32 {
        self.context.size()
    }

    /// Rank of the calling process in the world communicator.
    pub fn world_rank(&self) -> i32 {
        self.context.members[self.rank as usize]
    }

    /// Group of processes in this communicator. The caller frees it.
    pub fn group(&self) -> Result<Group> {
        Ok(Group::from_members(
            Arc::clone(&self.context.members),
            self.world_rank(),
        ))
    }

    /// Barrier synchronization.
    ///
    /// All processes in the communicator must call this function. No process
    /// will return until all processes have entered the barrier.
    pub fn barrier(&self) -> Result<()> {
        self.context
            .rendezvous
            .exchange(&self.runtime.abort, self.rank, (), |_| ())
    }

    /// Duplicate this communicator.
    ///
    /// Collective. The duplicate has the same group and a new context, so
    /// its collectives never match those of the original.
    pub fn duplicate(&self) -> Result<Self> {
        let runtime = &self.runtime;
        let members = Arc::clone(&self.context.members);
        let context = self
            .context
            .rendezvous
            .exchange(&runtime.abort, self.rank, (), |_| {
                runtime.new_context(members)
            })?;
        log::debug!(
            "rank {}: duplicated context {} into {}",
            self.world_rank(),
            self.context.id,
            context.id
        );
        Ok(Communicator::new(Arc::clone(runtime), context, self.rank))
    }
}

impl fmt::Debug for Communicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Communicator")
            .field("context", &self.context.id)
            .field("rank", &self.rank)
            .field("size", &self.size())
            .finish()
    }
}

// Communicators are not Send or Sync: each handle belongs to the logical
// process it was created for.
