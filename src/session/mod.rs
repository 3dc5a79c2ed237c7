//! Client-side session state: recent results plus cumulative statistics.

pub mod aggregate;
pub mod controller;
pub mod history;

pub use aggregate::AggregateStats;
pub use controller::{SessionConfig, SessionController, SessionError, SessionSnapshot, SubmitOutcome};
