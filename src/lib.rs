//! # ferrorma
//!
//! MPI-style one-sided memory windows for logical processes hosted in one
//! OS process.
//!
//! This crate implements the window facility of the MPI standard on top of a
//! small in-process runtime, providing:
//! - A [`Universe`] launcher that runs N logical processes in lock-step
//! - Communicators with world/self contexts, barrier and duplicate
//! - Memory allocation for window registration with observable reference counts
//! - Windows with predefined and cached attributes, naming and fences
//! - Process groups and group comparison
//! - Predefined and user-defined window error handlers
//! - Vendor profiles for the error classes implementations disagree on
//!
//! ## Quick Start
//!
//! ```
//! use ferrorma::{Info, Keyval, Universe, Window};
//!
//! fn main() -> Result<(), ferrorma::Error> {
//!     let universe = Universe::new(4)?;
//!     universe.run(|mpi| -> Result<(), ferrorma::Error> {
//!         let world = mpi.world();
//!
//!         let memory = mpi.alloc_mem(64, &Info::null())?;
//!         let mut win = Window::create(Some(&memory), 8, &Info::null(), &world)?;
//!         assert_eq!(win.get_attr(Keyval::WIN_DISP_UNIT)?, Some(8));
//!
//!         win.free()?;
//!         mpi.free_mem(memory)
//!     })?
//!     .into_iter()
//!     .collect::<Result<Vec<()>, _>>()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Collective Calls
//!
//! Window creation and free, communicator duplication, barriers and fences
//! are collective: every member must make the same calls in the same order.
//! A member that skips one leaves the others waiting forever, as in a real
//! MPI job.
//!
//! ## Error Handling
//!
//! Every operation returns [`Result`]. Errors raised on a live window first
//! go through the window's [`Errhandler`]; under
//! [`Errhandler::ERRORS_ARE_FATAL`] the whole universe is aborted and
//! [`Universe::run`] reports [`Error::Aborted`].

#![warn(missing_docs)]
#![warn(clippy::all)]
// Allow certain pedantic lints for existing code
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

mod alloc;
mod attr;
mod collective;
mod comm;
pub mod config;
mod errhandler;
mod error;
mod group;
mod info;
mod runtime;
mod window;

pub use alloc::Buffer;
pub use attr::Keyval;
pub use comm::Communicator;
pub use config::{RuntimeConfig, Vendor};
pub use errhandler::{Errhandler, Predefined, UserErrhandler};
pub use error::{Error, ErrorClass, Result};
pub use group::{Group, GroupRelation};
pub use info::{Info, MAX_INFO_KEY, MAX_INFO_VAL};
pub use window::{Window, BOTTOM, MAX_OBJECT_NAME};

use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crate::collective::AbortCause;
use crate::runtime::Runtime;

/// A set of logical processes launched together.
///
/// Each call to [`run()`](Self::run) starts one thread per process and hands
/// it an [`Mpi`] handle. State created through the runtime (communicator
/// contexts, keyvals, the allocator) lives as long as the universe.
///
/// # Example
///
/// ```
/// use ferrorma::Universe;
///
/// let universe = Universe::new(4).unwrap();
/// let ranks = universe.run(|mpi| mpi.world().rank()).unwrap();
/// assert_eq!(ranks, vec![0, 1, 2, 3]);
/// ```
pub struct Universe {
    runtime: Arc<Runtime>,
}

impl Universe {
    /// Create a universe of `size` processes with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `size` is zero.
    pub fn new(size: usize) -> Result<Self> {
        Self::with_config(size, RuntimeConfig::default())
    }

    /// Create a universe of `size` processes with an explicit configuration.
    pub fn with_config(size: usize, config: RuntimeConfig) -> Result<Self> {
        let runtime = Runtime::new(size, config)?;
        log::debug!(
            "universe of {size} process(es), {} profile",
            runtime.config.vendor.name()
        );
        Ok(Universe {
            runtime: Arc::new(runtime),
        })
    }

    /// Create a universe configured from the environment
    /// (see [`RuntimeConfig::from_env()`]).
    pub fn from_env(size: usize) -> Result<Self> {
        Self::with_config(size, RuntimeConfig::from_env()?)
    }

    /// Number of processes.
    pub fn size(&self) -> usize {
        self.runtime.world.members.len()
    }

    /// The configuration of this universe.
    pub fn config(&self) -> &RuntimeConfig {
        &self.runtime.config
    }

    /// Number of buffers allocated and not yet freed.
    pub fn live_buffers(&self) -> usize {
        self.runtime.allocator.live_count()
    }

    /// Run `f` once per process, each on its own thread, and collect the
    /// results in rank order.
    ///
    /// If a process panics, the universe is aborted so that no other process
    /// waits forever in a collective, and the panic is resumed on the calling
    /// thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Aborted`] if a fatal error handler or [`Mpi::abort()`]
    /// aborted the universe, now or in an earlier run.
    pub fn run<F, R>(&self, f: F) -> Result<Vec<R>>
    where
        F: Fn(Mpi) -> R + Sync,
        R: Send,
    {
        if self.runtime.abort.is_raised() {
            return Err(self.runtime.abort.error());
        }

        let outcomes = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.size());
            for rank in 0..self.size() as i32 {
                let runtime = Arc::clone(&self.runtime);
                let f = &f;
                let spawned = thread::Builder::new()
                    .name(format!("rank-{rank}"))
                    .spawn_scoped(scope, move || {
                        let mpi = Mpi::new(Arc::clone(&runtime), rank);
                        panic::catch_unwind(AssertUnwindSafe(|| f(mpi))).map_err(|payload| {
                            runtime.abort.raise(AbortCause::Panic { rank });
                            payload
                        })
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        self.runtime.abort.raise(AbortCause::Fatal {
                            rank,
                            reason: format!("cannot spawn process thread: {e}"),
                        });
                        break;
                    }
                }
            }
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(Err))
                .collect::<Vec<_>>()
        });

        if let Some(AbortCause::Fatal { .. }) = self.runtime.abort.cause() {
            return Err(self.runtime.abort.error());
        }
        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(value) => results.push(value),
                Err(payload) => panic::resume_unwind(payload),
            }
        }
        Ok(results)
    }
}

/// Handle of one logical process.
///
/// Handed to the closure passed to [`Universe::run()`].
pub struct Mpi {
    runtime: Arc<Runtime>,
    rank: i32,
    /// Marker to make Mpi !Send and !Sync
    _marker: PhantomData<*const ()>,
}

impl Mpi {
    fn new(runtime: Arc<Runtime>, rank: i32) -> Self {
        Mpi {
            runtime,
            rank,
            _marker: PhantomData,
        }
    }

    pub(crate) fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Get a handle to `MPI_COMM_WORLD`.
    pub fn world(&self) -> Communicator {
        Communicator::new(
            Arc::clone(&self.runtime),
            Arc::clone(&self.runtime.world),
            self.rank,
        )
    }

    /// Get a handle to `MPI_COMM_SELF`.
    pub fn self_comm(&self) -> Communicator {
        Communicator::new(
            Arc::clone(&self.runtime),
            Arc::clone(&self.runtime.selves[self.rank as usize]),
            0,
        )
    }

    /// Rank of this process in the world communicator.
    pub fn rank(&self) -> i32 {
        self.rank
    }

    /// The configuration of the universe.
    pub fn config(&self) -> &RuntimeConfig {
        &self.runtime.config
    }

    /// Allocate `size` zeroed bytes for window registration (`MPI_Alloc_mem`).
    ///
    /// Info hints are accepted and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] for a negative size or a failed allocation.
    pub fn alloc_mem(&self, size: i64, info: &Info) -> Result<Buffer> {
        self.runtime.allocator.allocate(size, info)
    }

    /// Return a buffer to the allocator (`MPI_Free_mem`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the buffer comes from another
    /// universe, was already freed, or is still exposed by a window.
    pub fn free_mem(&self, buffer: Buffer) -> Result<()> {
        self.runtime.allocator.free(buffer)
    }

    /// Address of a buffer (`MPI_Get_address`).
    pub fn get_address(&self, buffer: &Buffer) -> i64 {
        buffer.address() as i64
    }

    /// Seconds elapsed since the universe was created.
    pub fn wtime(&self) -> f64 {
        self.runtime.elapsed()
    }

    /// Library version string.
    pub fn version(&self) -> String {
        format!(
            "ferrorma {} ({} profile)",
            env!("CARGO_PKG_VERSION"),
            self.runtime.config.vendor.name()
        )
    }

    /// Abort every process of the universe (`MPI_Abort`).
    pub fn abort(&self, errorcode: i32) -> ! {
        self.runtime
            .abort(self.rank, format!("MPI_Abort called with code {errorcode}"))
    }
}

// Mpi is not Send or Sync: it belongs to the thread of its logical process.
