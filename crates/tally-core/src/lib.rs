//! tally-core library.
//!
//! Passive per-file time accounting: file-access markers are folded into
//! 60 second windows, allocated across files, accumulated in a local metric
//! store, and finalized into a note attached to each commit.
//!
//! # Conventions
//!
//! - **Errors**: Return [`error::Result`] with a typed [`error::TallyError`].
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).
//! - **Time**: Never read the system clock directly; take a `&dyn Clock`.

pub mod allocate;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod lock;
pub mod metric;
pub mod note;
pub mod paths;
pub mod pipeline;
pub mod report;
pub mod scm;
pub mod split;
pub mod window;

pub use error::{ErrorCode, Result, TallyError};
pub use paths::Project;
