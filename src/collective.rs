//! Rendezvous engine behind every collective call.
//!
//! Each communication context (a communicator or a window) owns one
//! [`Rendezvous`]. The n-th collective call made by every member of the
//! context meets in round n: every member deposits a contribution, the last
//! one to arrive folds all contributions into an outcome, and every member
//! leaves with a clone of that outcome.
//!
//! Members that skip or reorder a collective wait forever, exactly like a
//! real MPI job would. Contributions of different types in the same round are
//! detected and reported as [`Error::Internal`] on every member.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

/// How often a blocked member re-checks the abort signal.
const ABORT_POLL: Duration = Duration::from_millis(20);

/// Why a universe stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AbortCause {
    /// An error hit the fatal error handler or `Mpi::abort` was called.
    Fatal { rank: i32, reason: String },
    /// A logical process panicked.
    Panic { rank: i32 },
}

/// Universe-wide abort flag.
#[derive(Debug, Default)]
pub(crate) struct AbortSignal {
    raised: AtomicBool,
    cause: Mutex<Option<AbortCause>>,
}

impl AbortSignal {
    /// Record the abort. The first cause wins.
    pub(crate) fn raise(&self, cause: AbortCause) {
        let mut slot = self.cause.lock();
        if slot.is_none() {
            *slot = Some(cause);
        }
        self.raised.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    pub(crate) fn cause(&self) -> Option<AbortCause> {
        self.cause.lock().clone()
    }

    /// The error a member observes when the universe went down under it.
    pub(crate) fn error(&self) -> Error {
        match self.cause() {
            Some(AbortCause::Fatal { rank, reason }) => Error::Aborted { rank, reason },
            Some(AbortCause::Panic { rank }) => Error::Aborted {
                rank,
                reason: "process panicked".into(),
            },
            None => Error::Internal("abort signal raised without a cause".into()),
        }
    }
}

struct Round {
    contributions: Vec<Option<Box<dyn Any + Send>>>,
    arrived: usize,
    outcome: Option<Arc<dyn Any + Send + Sync>>,
    collected: usize,
}

impl Round {
    fn new(size: usize) -> Self {
        Round {
            contributions: (0..size).map(|_| None).collect(),
            arrived: 0,
            outcome: None,
            collected: 0,
        }
    }
}

struct State {
    /// Next round number per member.
    next_round: Vec<u64>,
    rounds: HashMap<u64, Round>,
}

/// Meeting point for the collective calls of one context.
pub(crate) struct Rendezvous {
    size: usize,
    state: Mutex<State>,
    arrived: Condvar,
}

impl Rendezvous {
    pub(crate) fn new(size: usize) -> Self {
        Rendezvous {
            size,
            state: Mutex::new(State {
                next_round: vec![0; size],
                rounds: HashMap::new(),
            }),
            arrived: Condvar::new(),
        }
    }

    /// Number of members taking part in every round.
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Take part in the next round as member `rank`.
    ///
    /// `finish` runs exactly once per round, on the last member to arrive,
    /// with the contributions ordered by rank. Its result is handed to every
    /// member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRank`] for a rank outside the context,
    /// [`Error::Internal`] when members contributed different types, and
    /// [`Error::Aborted`] when the universe is aborted while waiting.
    pub(crate) fn exchange<T, R, F>(
        &self,
        abort: &AbortSignal,
        rank: i32,
        value: T,
        finish: F,
    ) -> Result<R>
    where
        T: Send + 'static,
        R: Clone + Send + Sync + 'static,
        F: FnOnce(Vec<T>) -> R,
    {
        let slot = usize::try_from(rank)
            .ok()
            .filter(|&r| r < self.size)
            .ok_or(Error::InvalidRank(rank))?;
        if abort.is_raised() {
            return Err(abort.error());
        }

        let mut state = self.state.lock();
        let round_id = state.next_round[slot];
        state.next_round[slot] += 1;

        let size = self.size;
        let round = state
            .rounds
            .entry(round_id)
            .or_insert_with(|| Round::new(size));
        round.contributions[slot] = Some(Box::new(value));
        round.arrived += 1;
        log::trace!(
            "collective round {round_id}: rank {rank} arrived ({}/{size})",
            round.arrived
        );

        if round.arrived == size {
            let outcome: Result<R> = round
                .contributions
                .iter_mut()
                .map(|c| c.take().and_then(|b| b.downcast::<T>().ok()).map(|b| *b))
                .collect::<Option<Vec<T>>>()
                .map(finish)
                .ok_or_else(|| {
                    Error::Internal(format!("mismatched collective call in round {round_id}"))
                });
            let outcome: Arc<dyn Any + Send + Sync> = Arc::new(outcome);
            round.outcome = Some(outcome);
            self.arrived.notify_all();
        }

        loop {
            let round = state
                .rounds
                .get_mut(&round_id)
                .ok_or_else(|| Error::Internal(format!("collective round {round_id} vanished")))?;
            if let Some(outcome) = round.outcome.clone() {
                round.collected += 1;
                if round.collected == size {
                    state.rounds.remove(&round_id);
                }
                return match outcome.downcast_ref::<Result<R>>() {
                    Some(result) => result.clone(),
                    None => Err(Error::Internal(format!(
                        "mismatched collective call in round {round_id}"
                    ))),
                };
            }
            if abort.is_raised() {
                return Err(abort.error());
            }
            self.arrived.wait_for(&mut state, ABORT_POLL);
        }
    }
}
