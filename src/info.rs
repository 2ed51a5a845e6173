//! MPI Info object for passing hints to MPI operations.
//!
//! [`Info`] holds ordered key-value pairs used as hints by operations such as
//! window creation and memory allocation. The runtime passes hints through
//! without interpreting them.
//!
//! # Example
//!
//! ```
//! use ferrorma::Info;
//!
//! let info = Info::new().unwrap();
//! info.set("no_locks", "true").unwrap();
//! assert_eq!(info.get("no_locks").unwrap(), Some("true".to_string()));
//! ```

use std::fmt;

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Longest accepted info key, in bytes (`MPI_MAX_INFO_KEY - 1`).
pub const MAX_INFO_KEY: usize = 255;

/// Longest accepted info value, in bytes (`MPI_MAX_INFO_VAL`).
pub const MAX_INFO_VAL: usize = 1024;

/// An MPI info object for passing hints to MPI operations.
///
/// Use [`Info::null()`] to represent `MPI_INFO_NULL` (no hints), or
/// [`Info::new()`] to create a mutable info object that can hold key-value
/// pairs. [`Info::dup()`] creates an independent copy, like `MPI_Info_dup`.
///
/// # Example
///
/// ```
/// use ferrorma::Info;
///
/// // Create an info object with hints
/// let info = Info::new().unwrap();
/// info.set("accumulate_ordering", "none").unwrap();
///
/// // Use Info::null() when no hints are needed
/// let null_info = Info::null();
/// assert!(null_info.is_null());
/// ```
pub struct Info {
    /// `None` for `MPI_INFO_NULL`.
    entries: Option<Mutex<Vec<(String, String)>>>,
}

impl Info {
    /// Create a new empty MPI info object.
    ///
    /// # Errors
    ///
    /// Never fails today; the signature matches the other constructors.
    pub fn new() -> Result<Self> {
        Ok(Info {
            entries: Some(Mutex::new(Vec::new())),
        })
    }

    /// Get a handle representing `MPI_INFO_NULL`.
    pub fn null() -> Self {
        Info { entries: None }
    }

    /// Whether this is `MPI_INFO_NULL`.
    pub fn is_null(&self) -> bool {
        self.entries.is_none()
    }

    fn entries(&self, op: &str) -> Result<&Mutex<Vec<(String, String)>>> {
        self.entries
            .as_ref()
            .ok_or_else(|| Error::InvalidInfo(format!("cannot {op} MPI_INFO_NULL")))
    }

    /// Set a key-value pair on this info object.
    ///
    /// If the key already exists, its value is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if this is a null info object, if the key or value
    /// contains a null byte, or if either exceeds the MPI length limits.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let entries = self.entries("set key-value on")?;
        check_key(key)?;
        if value.contains('\0') {
            return Err(Error::InvalidInfo("info value contains null byte".into()));
        }
        if value.is_empty() || value.len() > MAX_INFO_VAL {
            return Err(Error::InvalidInfo(format!(
                "info value length {} is outside 1..={MAX_INFO_VAL}",
                value.len()
            )));
        }
        let mut entries = entries.lock();
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => entries.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// Get the value associated with a key.
    ///
    /// Returns `Ok(Some(value))` if the key exists, or `Ok(None)` if the key
    /// was not found.
    ///
    /// # Errors
    ///
    /// Returns an error if this is a null info object or the key is invalid.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries("get key-value from")?;
        check_key(key)?;
        Ok(entries
            .lock()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone()))
    }

    /// Remove a key.
    ///
    /// # Errors
    ///
    /// Returns an error if this is a null info object or the key is not set
    /// (`MPI_ERR_INFO_NOKEY`).
    pub fn delete(&self, key: &str) -> Result<()> {
        let entries = self.entries("delete key from")?;
        check_key(key)?;
        let mut entries = entries.lock();
        let before = entries.len();
        entries.retain(|(k, _)| k != key);
        if entries.len() == before {
            return Err(Error::InvalidInfo(format!("key '{key}' is not set")));
        }
        Ok(())
    }

    /// Number of keys set.
    pub fn len(&self) -> Result<usize> {
        Ok(self.entries("count keys of")?.lock().len())
    }

    /// Whether no keys are set.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The `n`-th key, in insertion order.
    pub fn nth_key(&self, n: usize) -> Result<String> {
        self.entries("read keys of")?
            .lock()
            .get(n)
            .map(|(k, _)| k.clone())
            .ok_or_else(|| Error::InvalidArgument(format!("info has no key number {n}")))
    }

    /// All key-value pairs, in insertion order.
    pub fn entries_vec(&self) -> Result<Vec<(String, String)>> {
        Ok(self.entries("read entries of")?.lock().clone())
    }

    /// Duplicate this info object. The copy of `MPI_INFO_NULL` is null.
    pub fn dup(&self) -> Info {
        Info {
            entries: self
                .entries
                .as_ref()
                .map(|entries| Mutex::new(entries.lock().clone())),
        }
    }
}

impl fmt::Debug for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entries {
            None => f.write_str("MPI_INFO_NULL"),
            Some(entries) => f.debug_map().entries(entries.lock().iter().cloned()).finish(),
        }
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.contains('\0') {
        return Err(Error::InvalidInfo("info key contains null byte".into()));
    }
    if key.is_empty() || key.len() > MAX_INFO_KEY {
        return Err(Error::InvalidInfo(format!(
            "info key length {} is outside 1..={MAX_INFO_KEY}",
            key.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    // --- Null info object tests ---

    #[test]
    fn null_info_is_null() {
        let info = Info::null();
        assert!(info.is_null());
        assert_eq!(format!("{info:?}"), "MPI_INFO_NULL");
    }

    #[test]
    fn null_info_set_returns_error() {
        let info = Info::null();
        let result = info.set("key", "value");
        assert!(result.is_err());
        let err_msg = format!("{}", result.unwrap_err());
        assert!(err_msg.contains("MPI_INFO_NULL"), "got: {err_msg}");
    }

    #[test]
    fn null_info_get_returns_error() {
        let info = Info::null();
        let result = info.get("key");
        assert!(result.is_err());
        let err_msg = format!("{}", result.unwrap_err());
        assert!(err_msg.contains("MPI_INFO_NULL"), "got: {err_msg}");
    }

    #[test]
    fn null_info_dup_is_null() {
        assert!(Info::null().dup().is_null());
    }

    // --- Key-value behaviour ---

    #[test]
    fn set_get_replace() {
        let info = Info::new().unwrap();
        assert_eq!(info.get("a").unwrap(), None);
        info.set("a", "1").unwrap();
        info.set("b", "2").unwrap();
        info.set("a", "3").unwrap();
        assert_eq!(info.get("a").unwrap(), Some("3".to_string()));
        assert_eq!(info.len().unwrap(), 2);
        assert_eq!(info.nth_key(0).unwrap(), "a");
        assert_eq!(info.nth_key(1).unwrap(), "b");
        assert!(info.nth_key(2).is_err());
    }

    #[test]
    fn delete_missing_key_fails() {
        let info = Info::new().unwrap();
        info.set("a", "1").unwrap();
        info.delete("a").unwrap();
        assert!(info.is_empty().unwrap());
        let err = info.delete("a").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Info);
    }

    #[test]
    fn dup_is_independent() {
        let info = Info::new().unwrap();
        info.set("k", "v").unwrap();
        let copy = info.dup();
        copy.set("k", "w").unwrap();
        assert_eq!(info.get("k").unwrap(), Some("v".to_string()));
        assert_eq!(copy.entries_vec().unwrap(), vec![("k".into(), "w".into())]);
    }

    // --- Validation ---

    #[test]
    fn set_key_with_null_byte_returns_error() {
        let info = Info::new().unwrap();
        let result = info.set("key\0bad", "value");
        let err_msg = format!("{}", result.unwrap_err());
        assert!(err_msg.contains("null byte"), "got: {err_msg}");
    }

    #[test]
    fn set_value_with_null_byte_returns_error() {
        let info = Info::new().unwrap();
        let result = info.set("key", "value\0bad");
        let err_msg = format!("{}", result.unwrap_err());
        assert!(err_msg.contains("null byte"), "got: {err_msg}");
    }

    #[test]
    fn get_key_with_null_byte_returns_error() {
        let info = Info::new().unwrap();
        let result = info.get("key\0bad");
        let err_msg = format!("{}", result.unwrap_err());
        assert!(err_msg.contains("null byte"), "got: {err_msg}");
    }

    #[test]
    fn length_limits() {
        let info = Info::new().unwrap();
        assert!(info.set(&"k".repeat(MAX_INFO_KEY), "v").is_ok());
        assert!(info.set(&"k".repeat(MAX_INFO_KEY + 1), "v").is_err());
        assert!(info.set("k", &"v".repeat(MAX_INFO_VAL + 1)).is_err());
        assert!(info.set("", "v").is_err());
        assert!(info.set("k", "").is_err());
    }
}
