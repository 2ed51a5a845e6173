//! Attribute keys.
//!
//! Windows answer [`Window::get_attr()`](crate::Window::get_attr) for three
//! predefined keys and cache integer values under user keys created with
//! [`Keyval::create()`].

use std::fmt;

use crate::error::{Error, Result};
use crate::Mpi;

/// An attribute key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Keyval(i32);

impl Keyval {
    /// `MPI_KEYVAL_INVALID`
    pub const INVALID: Keyval = Keyval(0x2400_0000);
    /// `MPI_WIN_BASE`: address of the window's memory
    pub const WIN_BASE: Keyval = Keyval(0x6600_0001);
    /// `MPI_WIN_SIZE`: size of the window's memory in bytes
    pub const WIN_SIZE: Keyval = Keyval(0x6600_0003);
    /// `MPI_WIN_DISP_UNIT`: displacement unit of the window
    pub const WIN_DISP_UNIT: Keyval = Keyval(0x6600_0005);

    /// Create a user keyval for window attributes (`MPI_Win_create_keyval`).
    pub fn create(mpi: &Mpi) -> Keyval {
        let keyval = Keyval(mpi.runtime().create_keyval());
        log::debug!("created keyval {}", keyval.0);
        keyval
    }

    /// Wrap a raw key value.
    pub fn from_raw(raw: i32) -> Keyval {
        Keyval(raw)
    }

    /// The raw key value.
    pub fn raw(self) -> i32 {
        self.0
    }

    /// Whether this is one of the predefined window keys.
    pub fn is_predefined(self) -> bool {
        matches!(
            self,
            Keyval::WIN_BASE | Keyval::WIN_SIZE | Keyval::WIN_DISP_UNIT
        )
    }

    /// Free a user keyval, turning this handle into [`Keyval::INVALID`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for predefined keys and an
    /// unknown-key error for keys that are not live.
    pub fn free(&mut self, mpi: &Mpi) -> Result<()> {
        if self.is_predefined() {
            return Err(Error::InvalidArgument(format!(
                "predefined keyval {self:?} cannot be freed"
            )));
        }
        let runtime = mpi.runtime();
        if !runtime.free_keyval(self.0) {
            return Err(runtime.unknown_key(self.0));
        }
        *self = Keyval::INVALID;
        Ok(())
    }
}

impl fmt::Debug for Keyval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Keyval::INVALID => f.write_str("MPI_KEYVAL_INVALID"),
            Keyval::WIN_BASE => f.write_str("MPI_WIN_BASE"),
            Keyval::WIN_SIZE => f.write_str("MPI_WIN_SIZE"),
            Keyval::WIN_DISP_UNIT => f.write_str("MPI_WIN_DISP_UNIT"),
            Keyval(raw) => write!(f, "Keyval({raw})"),
        }
    }
}
