//! CLI interface for costplan
//!
//! This module defines the command-line interface using clap.
//!
//! # Example
//!
//! ```bash
//! # Monthly cost breakdown of a plan
//! costplan breakdown --resources plan.json --usage usage.json
//!
//! # Cost change between two plans, priced offline
//! costplan diff --past before.json --current after.json --price-book prices.json --json
//! ```

use clap::{Parser, Subcommand};
use costplan_core::config::EngineConfig;
use costplan_core::error::{CostplanError, Result};
use std::path::PathBuf;

/// Estimate the monthly cost of planned infrastructure
#[derive(Parser, Debug, Clone)]
#[command(name = "costplan")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Configuration file (default: <config dir>/costplan/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Price offline from a price book file instead of the pricing API
    #[arg(long, global = true)]
    pub price_book: Option<PathBuf>,

    /// Pricing API endpoint
    #[arg(long, global = true)]
    pub pricing_endpoint: Option<String>,

    /// Maximum number of concurrent pricing requests
    #[arg(long, global = true)]
    pub max_concurrency: Option<usize>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the monthly cost breakdown of a set of resources
    Breakdown {
        /// Resource descriptors (JSON array)
        #[arg(long)]
        resources: PathBuf,

        /// Usage estimates keyed by resource address (JSON object)
        #[arg(long)]
        usage: Option<PathBuf>,
    },

    /// Show the monthly cost change between two sets of resources
    Diff {
        /// Resource descriptors before the change
        #[arg(long)]
        past: PathBuf,

        /// Resource descriptors after the change
        #[arg(long)]
        current: PathBuf,

        /// Usage estimates keyed by resource address, applied to both sides
        #[arg(long)]
        usage: Option<PathBuf>,
    },
}

impl Cli {
    /// Load the engine configuration and apply command-line overrides
    ///
    /// Precedence, lowest first: defaults, config file, environment, flags.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = EngineConfig::load(self.config.as_deref())?.with_env_overrides();

        if let Some(endpoint) = &self.pricing_endpoint {
            config.pricing_api_endpoint = endpoint.clone();
        }
        if let Some(max_concurrency) = self.max_concurrency {
            if max_concurrency == 0 {
                return Err(CostplanError::InvalidArgument(
                    "--max-concurrency must be at least 1".to_string(),
                ));
            }
            config.max_concurrency = max_concurrency;
        }

        config.validate()?;
        Ok(config)
    }
}
