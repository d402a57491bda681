pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::CliConfig;
pub use core::{bootstrap, ProgressService, TableStore};
pub use domain::Canonical;
pub use utils::error::{Result, StudyError};
