//! One-sided memory windows.
//!
//! This module provides [`Window`], which exposes a local [`Buffer`] (or no
//! memory at all) to every process of a communicator. A window records the
//! base address, size and displacement unit of the exposed memory, carries an
//! error handler, an optional name and cached attributes, and holds one
//! reference to its buffer until it is freed.
//!
//! # Lifecycle
//!
//! [`Window::create()`] and [`Window::free()`] are collective: every process
//! of the communicator must call them, in the same order. `free` turns the
//! handle into the null window ([`Window::null()`]); freeing it again fails
//! with `MPI_ERR_WIN`.
//!
//! # Example
//!
//! ```
//! use ferrorma::{Info, Keyval, Universe, Window};
//!
//! let universe = Universe::new(2).unwrap();
//! universe
//!     .run(|mpi| {
//!         let memory = mpi.alloc_mem(10, &Info::null()).unwrap();
//!         let before = memory.ref_count();
//!
//!         let mut win = Window::create(Some(&memory), 1, &Info::null(), &mpi.world()).unwrap();
//!         assert_eq!(memory.ref_count(), before + 1);
//!         assert_eq!(win.get_attr(Keyval::WIN_SIZE).unwrap(), Some(10));
//!         assert_eq!(win.get_attr(Keyval::WIN_DISP_UNIT).unwrap(), Some(1));
//!
//!         win.free().unwrap();
//!         assert_eq!(memory.ref_count(), before);
//!         mpi.free_mem(memory).unwrap();
//!     })
//!     .unwrap();
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::alloc::{Buffer, Exposure};
use crate::attr::Keyval;
use crate::comm::Communicator;
use crate::errhandler::{Errhandler, Predefined};
use crate::error::{Error, ErrorClass, Result};
use crate::group::Group;
use crate::info::Info;
use crate::runtime::{Context, Runtime};

/// Base address reported for a window that exposes no memory (`MPI_BOTTOM`).
pub const BOTTOM: i64 = 0;

/// Size of the name buffer for MPI objects (`MPI_MAX_OBJECT_NAME`).
pub const MAX_OBJECT_NAME: usize = 128;

const NULL_WINDOW: &str = "MPI_WIN_NULL";

/// What one process brings to a window creation.
struct Proposal {
    base: i64,
    size: i64,
    disp_unit: i32,
    error: Option<Error>,
}

/// State common to every process's handle of one window.
struct Shared {
    id: u64,
    /// Private context for the window's collectives.
    context: Arc<Context>,
    /// (base, size) exposed by each rank.
    exposures: Vec<(i64, i64)>,
}

/// Mutable per-process state.
struct Local {
    errhandler: Errhandler,
    name: String,
    attrs: BTreeMap<i32, i64>,
}

struct Live {
    shared: Arc<Shared>,
    runtime: Arc<Runtime>,
    rank: i32,
    world_rank: i32,
    exposure: Option<Exposure>,
    base: i64,
    size: i64,
    disp_unit: i32,
    info: Info,
    local: Mutex<Local>,
}

/// A one-sided memory window.
///
/// # Thread Safety
///
/// `Window` is intentionally **not** `Send` or `Sync`: a window handle
/// belongs to the logical process that created it.
pub struct Window {
    live: Option<Live>,
    _marker: PhantomData<*mut ()>,
}

impl Window {
    /// The null window (`MPI_WIN_NULL`).
    pub fn null() -> Self {
        Window {
            live: None,
            _marker: PhantomData,
        }
    }

    /// Create a window over `buffer` (`MPI_Win_create`).
    ///
    /// Collective over `comm`: every member must call it with the same
    /// displacement unit. Passing `None` exposes no memory; the window then
    /// reports base [`BOTTOM`] and size 0. On success the window holds one
    /// reference to `buffer` until it is freed.
    ///
    /// # Errors
    ///
    /// Every member receives the same error:
    /// - [`Error::NotSupported`] if a member passed `None` and windows without
    ///   memory are disabled
    /// - [`Error::InvalidDispUnit`] if a member passed a non-positive unit
    /// - [`Error::InvalidArgument`] if a member passed a freed buffer or the
    ///   displacement units differ across members
    pub fn create(
        buffer: Option<&Buffer>,
        disp_unit: i32,
        info: &Info,
        comm: &Communicator,
    ) -> Result<Window> {
        let runtime = comm.runtime();
        let (base, size) = match buffer {
            Some(buf) => (buf.address() as i64, buf.len() as i64),
            None => (BOTTOM, 0),
        };
        let mut error = if buffer.is_none() && !runtime.config.null_base_windows {
            Some(Error::NotSupported(
                "windows without memory are disabled".into(),
            ))
        } else if disp_unit <= 0 {
            Some(Error::InvalidDispUnit(disp_unit))
        } else {
            None
        };
        // Registered before the rendezvous so the buffer cannot be freed while
        // the other members are still arriving.
        let mut exposure = None;
        if let (None, Some(buf)) = (&error, buffer) {
            match Exposure::new(buf) {
                Ok(registered) => exposure = Some(registered),
                Err(err) => error = Some(err),
            }
        }
        let proposal = Proposal {
            base,
            size,
            disp_unit,
            error,
        };

        let members = Arc::clone(&comm.context().members);
        let shared = comm.context().rendezvous.exchange(
            &runtime.abort,
            comm.rank(),
            proposal,
            |proposals: Vec<Proposal>| -> Result<Arc<Shared>> {
                if let Some(err) = proposals.iter().find_map(|p| p.error.clone()) {
                    return Err(err);
                }
                let unit = proposals[0].disp_unit;
                if proposals.iter().any(|p| p.disp_unit != unit) {
                    return Err(Error::InvalidArgument(
                        "displacement units differ across the group".into(),
                    ));
                }
                Ok(Arc::new(Shared {
                    id: runtime.next_window_id(),
                    context: runtime.new_context(members),
                    exposures: proposals.iter().map(|p| (p.base, p.size)).collect(),
                }))
            },
        )??;

        log::debug!(
            "rank {}: created window {} (base {base:#x}, size {size}, disp_unit {disp_unit})",
            comm.world_rank(),
            shared.id
        );

        Ok(Window {
            live: Some(Live {
                shared,
                runtime: Arc::clone(runtime),
                rank: comm.rank(),
                world_rank: comm.world_rank(),
                exposure,
                base,
                size,
                disp_unit,
                info: info.dup(),
                local: Mutex::new(Local {
                    errhandler: runtime.config.win_errhandler().clone(),
                    name: String::new(),
                    attrs: BTreeMap::new(),
                }),
            }),
            _marker: PhantomData,
        })
    }

    /// Whether this is the null window.
    pub fn is_null(&self) -> bool {
        self.live.is_none()
    }

    fn live(&self) -> Result<&Live> {
        self.live.as_ref().ok_or(Error::InvalidWindow(NULL_WINDOW))
    }

    /// Report `err` through the window's error handler.
    fn raise<T>(&self, err: Error) -> Result<T> {
        let live = self.live()?;
        let handler = live.local.lock().errhandler.clone();
        match handler {
            Errhandler::Predefined(Predefined::ErrorsAreFatal) => live.runtime.abort(
                live.world_rank,
                format!("window {}: {err}", live.shared.id),
            ),
            Errhandler::User(_) => {
                handler.invoke(self, &err);
                Err(err)
            }
            Errhandler::Predefined(Predefined::ErrorsReturn) => Err(err),
            Errhandler::Null => Err(missing_handler(live, &err)),
        }
    }

    /// Free the window (`MPI_Win_free`).
    ///
    /// Collective over the window's group. Releases the window's reference to
    /// its buffer, drops cached attributes and turns this handle into the null
    /// window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWindow`] if the window is already null.
    pub fn free(&mut self) -> Result<()> {
        let live = self.live()?;
        if let Err(err) =
            live.shared
                .context
                .rendezvous
                .exchange(&live.runtime.abort, live.rank, (), |_| ())
        {
            return self.raise(err);
        }
        if let Some(live) = self.live.take() {
            log::debug!(
                "rank {}: freed window {}",
                live.world_rank,
                live.shared.id
            );
        }
        Ok(())
    }

    /// Fence synchronization.
    ///
    /// A collective synchronization point over the window's group. No process
    /// returns before every member has entered the fence.
    pub fn fence(&self) -> Result<()> {
        let live = self.live()?;
        match live
            .shared
            .context
            .rendezvous
            .exchange(&live.runtime.abort, live.rank, (), |_| ())
        {
            Ok(()) => Ok(()),
            Err(err) => self.raise(err),
        }
    }

    /// Group of the processes that created the window. The caller frees it.
    pub fn group(&self) -> Result<Group> {
        let live = self.live()?;
        Ok(Group::from_members(
            Arc::clone(&live.shared.context.members),
            live.world_rank,
        ))
    }

    /// Rank of the calling process in the window's group.
    pub fn rank(&self) -> Result<i32> {
        Ok(self.live()?.rank)
    }

    /// Number of processes in the window's group.
    pub fn comm_size(&self) -> Result<i32> {
        Ok(self.live()?.shared.context.size())
    }

    /// Identifier shared by every process's handle of this window.
    pub fn raw_handle(&self) -> Result<u64> {
        Ok(self.live()?.shared.id)
    }

    /// Base address and size exposed by `rank`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRank`] for a rank outside the window's group.
    pub fn exposure_of(&self, rank: i32) -> Result<(i64, i64)> {
        let live = self.live()?;
        match usize::try_from(rank)
            .ok()
            .and_then(|r| live.shared.exposures.get(r))
        {
            Some(&exposure) => Ok(exposure),
            None => self.raise(Error::InvalidRank(rank)),
        }
    }

    /// Base address, size and displacement unit of the local memory.
    pub fn attrs(&self) -> Result<(i64, i64, i32)> {
        let live = self.live()?;
        Ok((live.base, live.size, live.disp_unit))
    }

    /// A new handle to the exposed buffer, or `None` for a window without
    /// memory.
    pub fn memory(&self) -> Result<Option<Buffer>> {
        Ok(self
            .live()?
            .exposure
            .as_ref()
            .map(|e| e.buffer().clone()))
    }

    /// Copy of the info hints the window was created with.
    pub fn info(&self) -> Result<Info> {
        Ok(self.live()?.info.dup())
    }

    /// Look up an attribute (`MPI_Win_get_attr`).
    ///
    /// Predefined keys always have a value. User keys return `None` when
    /// nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns an unknown-key error ([`Error::is_unknown_key()`]) for
    /// [`Keyval::INVALID`] and keys that are not live. The reported class
    /// depends on the vendor profile.
    pub fn get_attr(&self, keyval: Keyval) -> Result<Option<i64>> {
        let live = self.live()?;
        match keyval {
            Keyval::WIN_BASE => Ok(Some(live.base)),
            Keyval::WIN_SIZE => Ok(Some(live.size)),
            Keyval::WIN_DISP_UNIT => Ok(Some(i64::from(live.disp_unit))),
            k if live.runtime.is_live_keyval(k.raw()) => {
                Ok(live.local.lock().attrs.get(&k.raw()).copied())
            }
            k => self.raise(live.runtime.unknown_key(k.raw())),
        }
    }

    /// Cache a value under a user key (`MPI_Win_set_attr`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for predefined keys and an
    /// unknown-key error for keys that are not live.
    pub fn set_attr(&self, keyval: Keyval, value: i64) -> Result<()> {
        self.check_user_key(keyval)?;
        self.live()?
            .local
            .lock()
            .attrs
            .insert(keyval.raw(), value);
        Ok(())
    }

    /// Remove a cached value (`MPI_Win_delete_attr`). Returns the removed
    /// value, if any.
    pub fn delete_attr(&self, keyval: Keyval) -> Result<Option<i64>> {
        self.check_user_key(keyval)?;
        Ok(self.live()?.local.lock().attrs.remove(&keyval.raw()))
    }

    fn check_user_key(&self, keyval: Keyval) -> Result<()> {
        let live = self.live()?;
        if keyval.is_predefined() {
            return self.raise(Error::InvalidArgument(format!(
                "predefined attribute {keyval:?} is read-only"
            )));
        }
        if !live.runtime.is_live_keyval(keyval.raw()) {
            return self.raise(live.runtime.unknown_key(keyval.raw()));
        }
        Ok(())
    }

    /// The window's current error handler (`MPI_Win_get_errhandler`).
    ///
    /// Never `MPI_ERRHANDLER_NULL` for a live window.
    pub fn errhandler(&self) -> Result<Errhandler> {
        Ok(self.live()?.local.lock().errhandler.clone())
    }

    /// Replace the window's error handler (`MPI_Win_set_errhandler`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for `MPI_ERRHANDLER_NULL`, reported
    /// through the current handler.
    pub fn set_errhandler(&self, handler: &Errhandler) -> Result<()> {
        let live = self.live()?;
        if handler.is_null() {
            return self.raise(Error::InvalidArgument(
                "cannot set MPI_ERRHANDLER_NULL on a window".into(),
            ));
        }
        live.local.lock().errhandler = handler.clone();
        Ok(())
    }

    /// Invoke the window's error handler with `class` (`MPI_Win_call_errhandler`).
    ///
    /// Returns `Ok(())` once the handler returns. Under
    /// `MPI_ERRORS_ARE_FATAL` the universe is aborted instead.
    pub fn call_errhandler(&self, class: ErrorClass) -> Result<()> {
        let live = self.live()?;
        let handler = live.local.lock().errhandler.clone();
        let err = Error::Class(class);
        match handler {
            Errhandler::Predefined(Predefined::ErrorsAreFatal) => live.runtime.abort(
                live.world_rank,
                format!("window {}: {err}", live.shared.id),
            ),
            Errhandler::User(_) => handler.invoke(self, &err),
            Errhandler::Predefined(Predefined::ErrorsReturn) => {}
            Errhandler::Null => return Err(missing_handler(live, &err)),
        }
        Ok(())
    }

    /// The window's name (`MPI_Win_get_name`). Empty until set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] when naming is disabled.
    pub fn name(&self) -> Result<String> {
        let live = self.live()?;
        if !live.runtime.config.win_naming {
            return Err(Error::NotSupported("window naming is disabled".into()));
        }
        Ok(live.local.lock().name.clone())
    }

    /// Name the window (`MPI_Win_set_name`).
    ///
    /// Names longer than `MAX_OBJECT_NAME - 1` bytes are truncated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] when naming is disabled.
    pub fn set_name(&self, name: &str) -> Result<()> {
        let live = self.live()?;
        if !live.runtime.config.win_naming {
            return Err(Error::NotSupported("window naming is disabled".into()));
        }
        live.local.lock().name = truncate_name(name).to_string();
        Ok(())
    }
}

fn missing_handler(live: &Live, err: &Error) -> Error {
    Error::Internal(format!(
        "window {} has no error handler (while reporting: {err})",
        live.shared.id
    ))
}

fn truncate_name(name: &str) -> &str {
    if name.len() < MAX_OBJECT_NAME {
        return name;
    }
    let mut end = MAX_OBJECT_NAME - 1;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    log::debug!("window name truncated to {end} bytes");
    &name[..end]
}

impl Drop for Window {
    fn drop(&mut self) {
        if let Some(live) = &self.live {
            log::warn!(
                "rank {}: window {} dropped without free; releasing its buffer reference",
                live.world_rank,
                live.shared.id
            );
        }
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.live {
            None => f.write_str(NULL_WINDOW),
            Some(live) => f
                .debug_struct("Window")
                .field("id", &live.shared.id)
                .field("rank", &live.rank)
                .field("base", &format_args!("{:#x}", live.base))
                .field("size", &live.size)
                .field("disp_unit", &live.disp_unit)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuntimeConfig, Vendor};
    use crate::Universe;

    #[test]
    fn truncate_long_names() {
        assert_eq!(truncate_name("mywin"), "mywin");
        let long = "x".repeat(300);
        assert_eq!(truncate_name(&long).len(), MAX_OBJECT_NAME - 1);
        let multibyte = "é".repeat(100);
        let cut = truncate_name(&multibyte);
        assert!(cut.len() < MAX_OBJECT_NAME);
        assert!(cut.chars().all(|c| c == 'é'));
    }

    #[test]
    fn null_window_rejects_everything() {
        let mut win = Window::null();
        assert!(win.is_null());
        assert_eq!(format!("{win:?}"), "MPI_WIN_NULL");
        assert_eq!(win.free().unwrap_err().class(), ErrorClass::Win);
        assert_eq!(win.errhandler().unwrap_err().class(), ErrorClass::Win);
        assert_eq!(
            win.set_errhandler(&Errhandler::ERRORS_RETURN)
                .unwrap_err()
                .class(),
            ErrorClass::Win
        );
        assert_eq!(
            win.call_errhandler(ErrorClass::Success).unwrap_err().class(),
            ErrorClass::Win
        );
        assert_eq!(
            win.get_attr(Keyval::WIN_BASE).unwrap_err().class(),
            ErrorClass::Win
        );
        assert_eq!(win.group().unwrap_err().class(), ErrorClass::Win);
        assert_eq!(win.name().unwrap_err().class(), ErrorClass::Win);
        assert_eq!(win.fence().unwrap_err().class(), ErrorClass::Win);
    }

    #[test]
    fn window_without_memory() {
        let universe = Universe::new(2).unwrap();
        universe
            .run(|mpi| {
                let mut win = Window::create(None, 4, &Info::null(), &mpi.world()).unwrap();
                assert_eq!(win.attrs().unwrap(), (BOTTOM, 0, 4));
                assert!(win.memory().unwrap().is_none());
                assert_eq!(win.exposure_of(1).unwrap(), (BOTTOM, 0));
                win.free().unwrap();
            })
            .unwrap();
    }

    #[test]
    fn window_without_memory_disabled() {
        let config = RuntimeConfig::default().null_base_windows(false);
        let universe = Universe::with_config(1, config).unwrap();
        universe
            .run(|mpi| {
                let err = Window::create(None, 1, &Info::null(), &mpi.self_comm()).unwrap_err();
                assert!(err.is_not_supported(), "got: {err}");
            })
            .unwrap();
    }

    #[test]
    fn bad_disp_unit_fails_on_every_rank() {
        let universe = Universe::new(3).unwrap();
        let errors = universe
            .run(|mpi| {
                let world = mpi.world();
                let unit = if world.rank() == 1 { 0 } else { 8 };
                Window::create(None, unit, &Info::null(), &world).unwrap_err()
            })
            .unwrap();
        assert!(errors.iter().all(|e| *e == Error::InvalidDispUnit(0)));
    }

    #[test]
    fn differing_disp_units_fail_on_every_rank() {
        let universe = Universe::new(2).unwrap();
        let errors = universe
            .run(|mpi| {
                let world = mpi.world();
                let unit = world.rank() + 1;
                Window::create(None, unit, &Info::null(), &world).unwrap_err()
            })
            .unwrap();
        assert!(errors.iter().all(|e| e.class() == ErrorClass::Arg));
    }

    #[test]
    fn exposures_are_visible_to_every_rank() {
        let universe = Universe::new(3).unwrap();
        universe
            .run(|mpi| {
                let world = mpi.world();
                let len = 8 * (world.rank() as i64 + 1);
                let buf = mpi.alloc_mem(len, &Info::null()).unwrap();
                let mut win = Window::create(Some(&buf), 8, &Info::null(), &world).unwrap();
                for r in 0..3 {
                    let (_, size) = win.exposure_of(r).unwrap();
                    assert_eq!(size, 8 * (r as i64 + 1));
                }
                assert_eq!(win.exposure_of(3).unwrap_err(), Error::InvalidRank(3));
                assert_eq!(win.exposure_of(world.rank()).unwrap().0, buf.address() as i64);
                win.fence().unwrap();
                win.free().unwrap();
                mpi.free_mem(buf).unwrap();
            })
            .unwrap();
    }

    #[test]
    fn memory_and_info_are_copies() {
        let universe = Universe::new(1).unwrap();
        universe
            .run(|mpi| {
                let buf = mpi.alloc_mem(4, &Info::null()).unwrap();
                let hints = Info::new().unwrap();
                hints.set("no_locks", "true").unwrap();
                let mut win = Window::create(Some(&buf), 1, &hints, &mpi.self_comm()).unwrap();
                hints.set("no_locks", "false").unwrap();
                assert_eq!(
                    win.info().unwrap().get("no_locks").unwrap(),
                    Some("true".to_string())
                );

                let mem = win.memory().unwrap().unwrap();
                assert!(mem.same_memory(&buf));
                assert_eq!(buf.ref_count(), 3);
                drop(mem);
                assert_eq!(buf.ref_count(), 2);

                assert!(mpi.free_mem(buf.clone()).is_err());
                win.free().unwrap();
                assert_eq!(buf.window_refs(), 0);
                mpi.free_mem(buf).unwrap();
            })
            .unwrap();
    }

    #[test]
    fn user_attributes() {
        let universe = Universe::new(1).unwrap();
        universe
            .run(|mpi| {
                let mut key = Keyval::create(&mpi);
                let mut win = Window::create(None, 1, &Info::null(), &mpi.self_comm()).unwrap();
                assert_eq!(win.get_attr(key).unwrap(), None);
                win.set_attr(key, 42).unwrap();
                assert_eq!(win.get_attr(key).unwrap(), Some(42));
                assert_eq!(win.delete_attr(key).unwrap(), Some(42));
                assert_eq!(win.get_attr(key).unwrap(), None);
                assert_eq!(
                    win.set_attr(Keyval::WIN_SIZE, 1).unwrap_err().class(),
                    ErrorClass::Arg
                );
                key.free(&mpi).unwrap();
                assert_eq!(key, Keyval::INVALID);
                assert!(win.get_attr(key).unwrap_err().is_unknown_key());
                win.free().unwrap();
            })
            .unwrap();
    }

    #[test]
    fn unknown_key_class_follows_vendor() {
        for (vendor, class) in [
            (Vendor::Mpich, ErrorClass::Keyval),
            (Vendor::OpenMpi, ErrorClass::Other),
        ] {
            let universe = Universe::with_config(1, RuntimeConfig::default().vendor(vendor)).unwrap();
            universe
                .run(|mpi| {
                    let mut win =
                        Window::create(None, 1, &Info::null(), &mpi.self_comm()).unwrap();
                    let err = win.get_attr(Keyval::INVALID).unwrap_err();
                    assert!(err.is_unknown_key());
                    assert_eq!(err.class(), class);
                    win.free().unwrap();
                })
                .unwrap();
        }
    }

    #[test]
    fn configured_handler_is_installed_and_never_null() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let handler = Errhandler::create_win(move |_, err| {
            assert_eq!(err.class(), ErrorClass::Arg);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let config = RuntimeConfig::default()
            .default_win_errhandler(handler.clone())
            .unwrap();
        let universe = Universe::with_config(2, config).unwrap();
        universe
            .run(|mpi| {
                let mut win = Window::create(None, 1, &Info::null(), &mpi.world()).unwrap();
                assert_eq!(win.errhandler().unwrap(), handler);
                let err = win.set_errhandler(&Errhandler::NULL).unwrap_err();
                assert_eq!(err.class(), ErrorClass::Arg);
                assert_eq!(win.errhandler().unwrap(), handler);
                assert!(!win.errhandler().unwrap().is_null());
                win.free().unwrap();
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropped_window_releases_buffer() {
        let universe = Universe::new(1).unwrap();
        universe
            .run(|mpi| {
                let buf = mpi.alloc_mem(2, &Info::null()).unwrap();
                let win = Window::create(Some(&buf), 1, &Info::null(), &mpi.self_comm()).unwrap();
                assert_eq!(buf.window_refs(), 1);
                drop(win);
                assert_eq!(buf.window_refs(), 0);
                assert_eq!(buf.ref_count(), 1);
                mpi.free_mem(buf).unwrap();
            })
            .unwrap();
    }
}
