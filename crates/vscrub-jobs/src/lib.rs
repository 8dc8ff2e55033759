//! Job lifecycle tracking.
//!
//! The tracker is the single writer for job records. Engine events flow
//! through a driver task per job, which applies them in channel order;
//! handlers only read snapshots and request cancellation.

pub mod error;
pub mod tracker;

pub use error::JobError;
pub use tracker::JobTracker;
