//! Process-local user repository.
//!
//! State lives for the lifetime of the process; a restart starts empty.
//! The repository interface is the seam a durable backend would slot
//! into.

pub mod error;
pub mod users;

pub use error::StoreError;
pub use users::UserStore;
