//! Ledger storage.
//!
//! Services talk to storage only through [`Store`]: every multi-record change
//! runs inside [`Store::atomically`], which either keeps all of the unit's
//! writes or none of them.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::{LedgerError, StoreError};

mod tables;
mod unit;

pub use tables::Tables;
pub use unit::UnitOfWork;

pub trait Store: Send + Sync {
    /// Run `work` as one atomic unit. No other unit observes its intermediate
    /// state; if `work` returns an error every write it made is undone.
    fn atomically<T>(
        &self,
        now: DateTime<Utc>,
        work: impl FnOnce(&mut UnitOfWork<'_>) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError>;

    /// Consistent read-only view.
    fn read<T>(&self, view: impl FnOnce(&Tables) -> T) -> Result<T, LedgerError>;
}

/// In-process store. A single lock serializes units; it is held only for the
/// duration of one unit and never across an `.await`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn atomically<T>(
        &self,
        now: DateTime<Utc>,
        work: impl FnOnce(&mut UnitOfWork<'_>) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        let mut unit = UnitOfWork::new(&mut tables, now);
        match work(&mut unit) {
            Ok(value) => {
                unit.commit();
                Ok(value)
            }
            Err(e) => {
                unit.rollback();
                Err(e)
            }
        }
    }

    fn read<T>(&self, view: impl FnOnce(&Tables) -> T) -> Result<T, LedgerError> {
        let tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(view(&tables))
    }
}
