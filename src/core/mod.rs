pub mod bootstrap;
pub mod service;
pub mod table;

pub use crate::utils::error::Result;
pub use service::ProgressService;
pub use table::TableStore;
