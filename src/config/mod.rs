use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::Args;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct CliConfig {
    /// Directory holding the five CSV collections
    #[arg(long, default_value = "resources")]
    pub data_dir: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("data_dir", &self.data_dir)
    }
}
