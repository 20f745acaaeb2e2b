//! Node settings loaded from a YAML file. Durations are in milliseconds.

use {
    crate::{repush_service::DEFAULT_REPUSH_IDLE_SLEEP, txpool::PoolConfig},
    serde::{de::DeserializeOwned, Serialize},
    std::{
        fs::{create_dir_all, File},
        io::{self, Write},
        path::Path,
        time::Duration,
    },
    strata_ledger::LedgerConfig,
    strata_runtime::{
        status_cache::{StatusCache, DEFAULT_STATUS_CACHE_CAPACITY, DEFAULT_STATUS_CACHE_TTL},
        transaction_processor::ProcessorConfig,
        trigger::DEFAULT_TRIGGER_CAPACITY,
    },
    strata_versioned_store::FlushPolicy,
    thiserror::Error,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct NodeConfig {
    pub max_pending: usize,
    pub max_shielded_pending: usize,
    pub priority_mode: bool,
    pub repush_idle_sleep_ms: u64,
    pub max_block_size: u64,
    pub max_shielded_per_block: usize,
    pub sig_verify_threads: usize,
    pub max_transaction_size: u64,
    pub max_expiration_window_ms: u64,
    pub min_flush_count: usize,
    pub max_flush_count: usize,
    pub shutdown_flush_window_ms: u64,
    pub dedup_cache_capacity: usize,
    pub dedup_cache_ttl_ms: u64,
    pub trigger_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let pool = PoolConfig::default();
        let ledger = LedgerConfig::default();
        let processor = ProcessorConfig::default();
        Self {
            max_pending: pool.max_pending,
            max_shielded_pending: pool.max_shielded_pending,
            priority_mode: pool.priority_mode,
            repush_idle_sleep_ms: DEFAULT_REPUSH_IDLE_SLEEP.as_millis() as u64,
            max_block_size: ledger.max_block_size,
            max_shielded_per_block: ledger.max_shielded_per_block,
            sig_verify_threads: ledger.sig_verify_threads,
            max_transaction_size: processor.max_transaction_size,
            max_expiration_window_ms: processor.max_expiration_window_ms,
            min_flush_count: ledger.flush_policy.min_flush_count,
            max_flush_count: ledger.flush_policy.max_flush_count,
            shutdown_flush_window_ms: ledger.flush_policy.shutdown_flush_window.as_millis() as u64,
            dedup_cache_capacity: DEFAULT_STATUS_CACHE_CAPACITY,
            dedup_cache_ttl_ms: DEFAULT_STATUS_CACHE_TTL.as_millis() as u64,
            trigger_capacity: DEFAULT_TRIGGER_CAPACITY,
        }
    }
}

impl NodeConfig {
    pub fn load(config_file: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_config_file(config_file)
    }

    pub fn save(&self, config_file: impl AsRef<Path>) -> Result<(), ConfigError> {
        save_config_file(self, config_file)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_pending: self.max_pending,
            max_shielded_pending: self.max_shielded_pending,
            priority_mode: self.priority_mode,
        }
    }

    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            max_transaction_size: self.max_transaction_size,
            max_expiration_window_ms: self.max_expiration_window_ms,
        }
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy {
            min_flush_count: self.min_flush_count,
            max_flush_count: self.max_flush_count,
            shutdown_flush_window: self.shutdown_flush_window(),
        }
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            max_block_size: self.max_block_size,
            max_shielded_per_block: self.max_shielded_per_block,
            sig_verify_threads: self.sig_verify_threads,
            flush_policy: self.flush_policy(),
        }
    }

    pub fn status_cache(&self) -> StatusCache {
        StatusCache::new(
            self.dedup_cache_capacity,
            Duration::from_millis(self.dedup_cache_ttl_ms),
        )
    }

    pub fn repush_idle_sleep(&self) -> Duration {
        Duration::from_millis(self.repush_idle_sleep_ms)
    }

    pub fn shutdown_flush_window(&self) -> Duration {
        Duration::from_millis(self.shutdown_flush_window_ms)
    }
}

pub fn load_config_file<T, P>(config_file: P) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let file = File::open(config_file)?;
    let config = serde_yaml::from_reader(file)?;
    Ok(config)
}

pub fn save_config_file<T, P>(config: &T, config_file: P) -> Result<(), ConfigError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let serialized = serde_yaml::to_string(config)?;
    if let Some(outdir) = config_file.as_ref().parent() {
        create_dir_all(outdir)?;
    }
    let mut file = File::create(config_file)?;
    file.write_all(b"---\n")?;
    file.write_all(serialized.as_bytes())?;
    Ok(())
}
