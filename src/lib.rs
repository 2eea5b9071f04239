pub mod amount;
pub mod clock;
pub mod collab;
pub mod command;
pub mod config;
pub mod csv;
pub mod engine;
pub mod error;
pub mod fee;
pub mod model;
pub mod settings;
pub mod store;

pub use amount::Amount;
pub use command::{Command, Selector};
pub use engine::{Collaborators, Engine};
pub use error::{LedgerError, StoreError};
