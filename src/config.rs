use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::engine::{AllocationPolicy, PricingPolicy};
use crate::inventory::{SeedError, TierSeed, default_seed, parse_seed};
use crate::model::CampgroundId;
use crate::pipeline::PipelineOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("CAMPSYNC_SEED: {0}")]
    Seed(#[from] SeedError),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bookings: PathBuf,
    pub data_dir: PathBuf,
    pub campground_id: CampgroundId,
    pub seed: Vec<TierSeed>,
    pub allocation: AllocationPolicy,
    pub pricing: PricingPolicy,
    pub write_concurrency: usize,
    pub write_timeout: Duration,
    pub occupancy_journal: Option<PathBuf>,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        let options = PipelineOptions::default();
        Self {
            bookings: PathBuf::from("./bookings.json"),
            data_dir: PathBuf::from("./data"),
            campground_id: options.campground_id,
            seed: default_seed(),
            allocation: options.allocation,
            pricing: options.pricing,
            write_concurrency: options.write_concurrency,
            write_timeout: options.write_timeout,
            occupancy_journal: None,
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset or blank variables keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(v) = get("CAMPSYNC_BOOKINGS") {
            config.bookings = PathBuf::from(v);
        }
        if let Some(v) = get("CAMPSYNC_DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("CAMPSYNC_CAMPGROUND_ID") {
            config.campground_id = parse("CAMPSYNC_CAMPGROUND_ID", v)?;
        }
        if let Some(v) = get("CAMPSYNC_SEED") {
            config.seed = parse_seed(&v)?;
        }
        if let Some(v) = get("CAMPSYNC_ALLOCATION_POLICY") {
            config.allocation = parse("CAMPSYNC_ALLOCATION_POLICY", v)?;
        }
        if let Some(v) = get("CAMPSYNC_PRICING_POLICY") {
            config.pricing = parse("CAMPSYNC_PRICING_POLICY", v)?;
        }
        if let Some(v) = get("CAMPSYNC_WRITE_CONCURRENCY") {
            let n: usize = parse("CAMPSYNC_WRITE_CONCURRENCY", v.clone())?;
            if n == 0 {
                return Err(ConfigError::Invalid {
                    var: "CAMPSYNC_WRITE_CONCURRENCY",
                    value: v,
                    reason: "must be at least 1".into(),
                });
            }
            config.write_concurrency = n;
        }
        if let Some(v) = get("CAMPSYNC_WRITE_TIMEOUT_MS") {
            config.write_timeout = Duration::from_millis(parse("CAMPSYNC_WRITE_TIMEOUT_MS", v)?);
        }
        config.occupancy_journal = get("CAMPSYNC_OCCUPANCY_JOURNAL").map(PathBuf::from);
        if let Some(v) = get("CAMPSYNC_METRICS_PORT") {
            config.metrics_port = Some(parse("CAMPSYNC_METRICS_PORT", v)?);
        }
        Ok(config)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            campground_id: self.campground_id,
            allocation: self.allocation,
            pricing: self.pricing,
            write_concurrency: self.write_concurrency,
            write_timeout: self.write_timeout,
        }
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join("documents")
    }

    pub fn confirmations_dir(&self) -> PathBuf {
        self.data_dir.join("confirmations")
    }

    pub fn system_of_record_dir(&self) -> PathBuf {
        self.data_dir.join("system_of_record")
    }
}

fn parse<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value,
    })
}
