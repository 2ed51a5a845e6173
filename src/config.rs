//! Runtime configuration.
//!
//! A [`RuntimeConfig`] selects the optional features and vendor behaviour of a
//! [`Universe`](crate::Universe). It can be built in code or read from the
//! environment with [`RuntimeConfig::from_env()`].
//!
//! # Environment Variables
//!
//! | Variable | Values | Default |
//! |----------|--------|---------|
//! | `FERRORMA_VENDOR` | `mpich`, `openmpi` | `mpich` |
//! | `FERRORMA_NULL_BASE` | boolean | `true` |
//! | `FERRORMA_WIN_NAMING` | boolean | `true` |
//! | `FERRORMA_WIN_ERRORS` | `return`, `fatal` | `return` |
//!
//! Booleans accept `1`/`0`, `true`/`false`, `yes`/`no` and `on`/`off`.

use std::env;

use crate::error::{Error, ErrorClass, Result};
use crate::errhandler::Errhandler;

/// Environment variable selecting the vendor profile.
pub const ENV_VENDOR: &str = "FERRORMA_VENDOR";
/// Environment variable toggling windows without a buffer.
pub const ENV_NULL_BASE: &str = "FERRORMA_NULL_BASE";
/// Environment variable toggling window naming.
pub const ENV_WIN_NAMING: &str = "FERRORMA_WIN_NAMING";
/// Environment variable selecting the initial window error handler.
pub const ENV_WIN_ERRORS: &str = "FERRORMA_WIN_ERRORS";

/// Vendor profile.
///
/// MPI implementations disagree on a few reported error classes. The profile
/// decides which one this runtime reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Vendor {
    /// MPICH and derivatives
    #[default]
    Mpich,
    /// Open MPI
    OpenMpi,
}

impl Vendor {
    /// Class reported when an attribute is looked up with an unknown key.
    pub fn unknown_keyval_class(self) -> ErrorClass {
        match self {
            Vendor::Mpich => ErrorClass::Keyval,
            Vendor::OpenMpi => ErrorClass::Other,
        }
    }

    /// Library name as reported by `MPI_Get_library_version`.
    pub fn name(self) -> &'static str {
        match self {
            Vendor::Mpich => "MPICH",
            Vendor::OpenMpi => "Open MPI",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mpich" => Ok(Vendor::Mpich),
            "openmpi" | "open mpi" | "ompi" => Ok(Vendor::OpenMpi),
            other => Err(Error::InvalidArgument(format!(
                "{ENV_VENDOR}: unknown vendor '{other}'"
            ))),
        }
    }
}

/// Configuration of a [`Universe`](crate::Universe).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Vendor profile used for vendor-dependent error classes.
    pub vendor: Vendor,
    /// Whether windows may be created without a buffer.
    pub null_base_windows: bool,
    /// Whether windows support `get_name`/`set_name`.
    pub win_naming: bool,
    /// Error handler installed on every new window. Never
    /// `MPI_ERRHANDLER_NULL`; set through
    /// [`default_win_errhandler()`](Self::default_win_errhandler).
    win_errhandler: Errhandler,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            vendor: Vendor::Mpich,
            null_base_windows: true,
            win_naming: true,
            win_errhandler: Errhandler::ERRORS_RETURN,
        }
    }
}

impl RuntimeConfig {
    /// Read the configuration from the process environment.
    ///
    /// Unset variables keep their default value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if a variable is set to a value that
    /// cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let mut config = RuntimeConfig::default();
        if let Some(value) = env_value(ENV_VENDOR) {
            config.vendor = Vendor::parse(&value)?;
        }
        if let Some(value) = env_value(ENV_NULL_BASE) {
            config.null_base_windows = parse_bool(ENV_NULL_BASE, &value)?;
        }
        if let Some(value) = env_value(ENV_WIN_NAMING) {
            config.win_naming = parse_bool(ENV_WIN_NAMING, &value)?;
        }
        if let Some(value) = env_value(ENV_WIN_ERRORS) {
            config.win_errhandler = match value.trim().to_ascii_lowercase().as_str() {
                "return" => Errhandler::ERRORS_RETURN,
                "fatal" => Errhandler::ERRORS_ARE_FATAL,
                other => {
                    return Err(Error::InvalidArgument(format!(
                        "{ENV_WIN_ERRORS}: expected 'return' or 'fatal', got '{other}'"
                    )))
                }
            };
        }
        Ok(config)
    }

    /// Set the vendor profile.
    pub fn vendor(mut self, vendor: Vendor) -> Self {
        self.vendor = vendor;
        self
    }

    /// Enable or disable windows without a buffer.
    pub fn null_base_windows(mut self, enabled: bool) -> Self {
        self.null_base_windows = enabled;
        self
    }

    /// Enable or disable window naming.
    pub fn win_naming(mut self, enabled: bool) -> Self {
        self.win_naming = enabled;
        self
    }

    /// Set the error handler installed on new windows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for the null handler.
    pub fn default_win_errhandler(mut self, handler: Errhandler) -> Result<Self> {
        if handler.is_null() {
            return Err(Error::InvalidArgument(
                "default window error handler cannot be MPI_ERRHANDLER_NULL".into(),
            ));
        }
        self.win_errhandler = handler;
        Ok(self)
    }

    /// The error handler installed on new windows.
    pub fn win_errhandler(&self) -> &Errhandler {
        &self.win_errhandler
    }
}

/// Get a non-empty environment variable.
fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::InvalidArgument(format!(
            "{name}: expected a boolean, got '{other}'"
        ))),
    }
}
