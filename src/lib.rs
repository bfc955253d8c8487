//! Media Archiver - files photos and videos into a dated archive
//!
//! Files from a source directory are placed at
//! `<dest>/<category>/YYYY/MM/DD/<bucket>/<name>`:
//! - the category folder comes from the file extension
//! - the date comes from the file's modification time
//! - the bucket is a single letter (`a`..`z`) that did not exist before the
//!   run, so nothing already archived is overwritten
//!
//! A retime mode finds files that are already archived (same name and size
//! under the same date) and restores their timestamps from the source.

pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod execute;
pub mod plan;
pub mod resolve;
pub mod time;

pub use classify::classify;
pub use cli::Cli;
pub use config::{Config, ConfigError, MediaTypeRule, Mode, Settings};
pub use error::{Error, Result};
pub use execute::{ExecutionStats, Executor};
pub use plan::{PlanStats, PlannedOperation, Planner};
pub use resolve::Resolver;
pub use time::{FileDescriptor, date_path};
