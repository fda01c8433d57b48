//! Write-once cell
//!
//! A value published exactly once and only readable afterwards. A second
//! `set` fails instead of overwriting; a `get` before `set` fails instead
//! of returning a default.

use std::fmt;
use std::sync::OnceLock;

use super::errors::{ReplicationError, ReplicationResult};

pub struct SetOnce<T> {
    name: &'static str,
    cell: OnceLock<T>,
}

impl<T> SetOnce<T> {
    /// Create an empty cell; `name` appears in errors
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: OnceLock::new(),
        }
    }

    /// Publish the value. Fails if it was already published.
    pub fn set(&self, value: T) -> ReplicationResult<()> {
        self.cell
            .set(value)
            .map_err(|_| ReplicationError::AlreadySet(self.name))
    }

    /// Read the published value. Fails if nothing was published yet.
    pub fn get(&self) -> ReplicationResult<&T> {
        self.cell.get().ok_or(ReplicationError::NotSet(self.name))
    }

    pub fn is_set(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for SetOnce<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetOnce")
            .field("name", &self.name)
            .field("value", &self.cell.get())
            .finish()
    }
}
