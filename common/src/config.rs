//! Configuration types for runtime and transfer settings

/// Runtime configuration for tokio and thread pools
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub max_workers: usize,
    /// Number of blocking threads (0 = tokio default of 512)
    pub max_blocking_threads: usize,
}

/// Transfer limits shared by all source/destination pairs of one run
#[derive(Debug, Clone, Copy)]
pub struct TransferConfig {
    /// Per-transfer bandwidth cap in kilobytes per second
    pub bandwidth_kb: u64,
    /// Maximum number of transfers running at once (0 = no limit)
    pub max_concurrent_transfers: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            bandwidth_kb: 1,
            max_concurrent_transfers: 10,
        }
    }
}

impl TransferConfig {
    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.bandwidth_kb == 0 {
            return Err("bandwidth must be at least 1 KB/s".to_string());
        }
        Ok(())
    }
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print summary statistics at the end
    pub print_summary: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TransferConfig::default();
        assert_eq!(config.bandwidth_kb, 1);
        assert_eq!(config.max_concurrent_transfers, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_bandwidth_is_rejected() {
        let config = TransferConfig {
            bandwidth_kb: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
