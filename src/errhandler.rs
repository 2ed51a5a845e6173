//! Window error handlers.
//!
//! Every live [`Window`] carries an [`Errhandler`] that decides what happens
//! when an operation on the window fails:
//!
//! - [`Errhandler::ERRORS_RETURN`]: the error is returned to the caller.
//! - [`Errhandler::ERRORS_ARE_FATAL`]: the whole universe is aborted.
//! - a user handler from [`Errhandler::create_win()`]: the callback runs, then
//!   the error is returned.
//!
//! Freeing a handle turns that handle into [`Errhandler::NULL`]; windows that
//! still use the handler are not affected.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::window::Window;

static NEXT_USER_HANDLER: AtomicU64 = AtomicU64::new(0);

/// Predefined error handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predefined {
    /// `MPI_ERRORS_ARE_FATAL`
    ErrorsAreFatal,
    /// `MPI_ERRORS_RETURN`
    ErrorsReturn,
}

type Callback = dyn Fn(&Window, &Error) + Send + Sync;

struct UserHandler {
    id: u64,
    callback: Box<Callback>,
}

/// A window error handler.
///
/// Handles compare equal when they refer to the same handler: predefined
/// handlers by kind, user handlers by identity.
#[derive(Clone)]
pub enum Errhandler {
    /// `MPI_ERRHANDLER_NULL`
    Null,
    /// One of the predefined handlers
    Predefined(Predefined),
    /// A handler created with [`Errhandler::create_win()`]
    User(UserErrhandler),
}

/// Handle to a user-defined error handler.
#[derive(Clone)]
pub struct UserErrhandler {
    inner: Arc<UserHandler>,
}

impl UserErrhandler {
    /// Unique identifier of the handler.
    pub fn id(&self) -> u64 {
        self.inner.id
    }
}

impl PartialEq for UserErrhandler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for UserErrhandler {}

impl Errhandler {
    /// `MPI_ERRHANDLER_NULL`
    pub const NULL: Errhandler = Errhandler::Null;
    /// `MPI_ERRORS_ARE_FATAL`
    pub const ERRORS_ARE_FATAL: Errhandler = Errhandler::Predefined(Predefined::ErrorsAreFatal);
    /// `MPI_ERRORS_RETURN`
    pub const ERRORS_RETURN: Errhandler = Errhandler::Predefined(Predefined::ErrorsReturn);

    /// Create a window error handler from a callback (`MPI_Win_create_errhandler`).
    ///
    /// The callback receives the window the error was raised on and the error.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    /// use ferrorma::{Errhandler, ErrorClass, Info, Universe, Window};
    ///
    /// let calls = Arc::new(AtomicUsize::new(0));
    /// let seen = Arc::clone(&calls);
    /// let handler = Errhandler::create_win(move |_win, _err| {
    ///     seen.fetch_add(1, Ordering::SeqCst);
    /// });
    ///
    /// Universe::new(1)
    ///     .unwrap()
    ///     .run(|mpi| {
    ///         let mut win = Window::create(None, 1, &Info::null(), &mpi.self_comm()).unwrap();
    ///         win.set_errhandler(&handler).unwrap();
    ///         win.call_errhandler(ErrorClass::Other).unwrap();
    ///         win.free().unwrap();
    ///     })
    ///     .unwrap();
    /// assert_eq!(calls.load(Ordering::SeqCst), 1);
    /// ```
    pub fn create_win<F>(callback: F) -> Errhandler
    where
        F: Fn(&Window, &Error) + Send + Sync + 'static,
    {
        Errhandler::User(UserErrhandler {
            inner: Arc::new(UserHandler {
                id: NEXT_USER_HANDLER.fetch_add(1, Ordering::Relaxed),
                callback: Box::new(callback),
            }),
        })
    }

    /// Whether this is `MPI_ERRHANDLER_NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Errhandler::Null)
    }

    /// Whether this is one of the predefined handlers.
    pub fn is_predefined(&self) -> bool {
        matches!(self, Errhandler::Predefined(_))
    }

    /// Free this handle, turning it into `MPI_ERRHANDLER_NULL`.
    ///
    /// Windows that still use the handler keep their own reference to it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the handle is already null.
    pub fn free(&mut self) -> Result<()> {
        if self.is_null() {
            return Err(Error::InvalidArgument(
                "cannot free MPI_ERRHANDLER_NULL".into(),
            ));
        }
        *self = Errhandler::Null;
        Ok(())
    }

    /// Run the user callback, if any.
    pub(crate) fn invoke(&self, window: &Window, error: &Error) {
        if let Errhandler::User(user) = self {
            (user.inner.callback)(window, error);
        }
    }
}

impl PartialEq for Errhandler {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Errhandler::Null, Errhandler::Null) => true,
            (Errhandler::Predefined(a), Errhandler::Predefined(b)) => a == b,
            (Errhandler::User(a), Errhandler::User(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Errhandler {}

impl fmt::Debug for Errhandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Errhandler::Null => f.write_str("MPI_ERRHANDLER_NULL"),
            Errhandler::Predefined(Predefined::ErrorsAreFatal) => {
                f.write_str("MPI_ERRORS_ARE_FATAL")
            }
            Errhandler::Predefined(Predefined::ErrorsReturn) => f.write_str("MPI_ERRORS_RETURN"),
            Errhandler::User(user) => write!(f, "Errhandler(user #{})", user.inner.id),
        }
    }
}
