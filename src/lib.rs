//! Courtline - waitlist promotion engine for pickleball events
//!
//! Keeps the waitlists of full tournaments and leagues in arrival order,
//! offers freed tournament spots for a 24 hour window, grants league spots
//! immediately and expires stale offers on a schedule.

pub mod api;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod notify;
pub mod server;
pub mod waitlist;

pub use context::AppContext;
pub use error::{WaitlistError, WaitlistResult};
