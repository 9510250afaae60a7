use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use comms::RegistryConfig;
use machine_learning::training::OptimizerSpec;
use serde::{Deserialize, Serialize};

use crate::{Result, WorkerErr, coordinator::RemotePolicy};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_QUERY_PATH: &str = "best_rating.php";
const DEFAULT_PUBLISH_PATH: &str = "save_neural_network.php";
const DEFAULT_INTERVAL_SECS: u64 = 30 * 60;
const DEFAULT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_BATCH_SIZE: usize = 10;

/// The shape of the game board and the range of its cell values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub cols: usize,
    pub rows: usize,
    pub players: usize,
    pub min_cell: i32,
    pub max_cell: i32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            cols: 4,
            rows: 7,
            players: 4,
            min_cell: 0,
            max_cell: 4,
        }
    }
}

impl BoardConfig {
    /// The model's input count, a value per cell plus a one-hot player block.
    pub fn input_width(&self) -> usize {
        self.cols * self.rows + self.players
    }

    pub fn hidden_width(&self) -> usize {
        self.cols * self.rows / 2
    }

    /// The model's output count, a value per column.
    pub fn output_width(&self) -> usize {
        self.cols
    }

    /// Returns the widths of every layer of the canonical model, input included.
    pub fn widths(&self) -> [usize; 3] {
        [self.input_width(), self.hidden_width(), self.output_width()]
    }
}

/// Everything a worker needs to run, supplied by the deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// The registry's `host[:port]`.
    pub host: String,
    pub query_path: String,
    pub publish_path: String,
    /// Seconds between two activations.
    pub interval_secs: u64,
    /// Seconds to wait for the registry before giving up on a request.
    pub timeout_secs: u64,
    /// Examples needed to run a training step.
    pub batch_size: usize,
    pub model_path: PathBuf,
    pub examples_dir: PathBuf,
    pub board: BoardConfig,
    pub optimizer: OptimizerSpec,
    pub policy: RemotePolicy,
    /// Seeds the initialization of fresh models, drawn from the os when absent.
    pub seed: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            query_path: DEFAULT_QUERY_PATH.to_string(),
            publish_path: DEFAULT_PUBLISH_PATH.to_string(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            model_path: PathBuf::from("model.json"),
            examples_dir: PathBuf::from("spool"),
            board: BoardConfig::default(),
            optimizer: OptimizerSpec::default(),
            policy: RemotePolicy::default(),
            seed: None,
        }
    }
}

impl WorkerConfig {
    /// Reads a configuration from a json file, missing fields take their default value.
    ///
    /// # Arguments
    /// * `path` - The path of the json file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Overrides fields with the process' environment variables.
    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(|key| env::var(key).ok())
    }

    /// Overrides fields with whatever `lookup` finds for `HOST`, `QUERY_PATH`, `PUBLISH_PATH`,
    /// `INTERVAL_SECS`, `BATCH_SIZE`, `MODEL_PATH` and `EXAMPLES_DIR`.
    ///
    /// # Arguments
    /// * `lookup` - Resolves a variable name into its value, if set.
    ///
    /// # Returns
    /// The overridden configuration or an error if a numeric variable doesn't parse.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(path) = lookup("QUERY_PATH") {
            self.query_path = path;
        }
        if let Some(path) = lookup("PUBLISH_PATH") {
            self.publish_path = path;
        }
        if let Some(secs) = lookup("INTERVAL_SECS") {
            self.interval_secs = parse_var("INTERVAL_SECS", &secs)?;
        }
        if let Some(size) = lookup("BATCH_SIZE") {
            self.batch_size = parse_var("BATCH_SIZE", &size)?;
        }
        if let Some(path) = lookup("MODEL_PATH") {
            self.model_path = path.into();
        }
        if let Some(dir) = lookup("EXAMPLES_DIR") {
            self.examples_dir = dir.into();
        }

        Ok(self)
    }

    /// Checks the configuration can drive an activation.
    pub fn validate(&self) -> Result<()> {
        let board = &self.board;

        let reason = if self.host.trim().is_empty() {
            "host is empty"
        } else if self.interval_secs == 0 {
            "interval must be at least a second"
        } else if self.batch_size == 0 {
            "batch size must be positive"
        } else if board.cols == 0 || board.rows == 0 || board.players == 0 {
            "board needs columns, rows and players"
        } else if board.hidden_width() == 0 {
            "board is too small for a hidden layer"
        } else if board.max_cell <= board.min_cell {
            "max cell value must be above min cell value"
        } else {
            return Ok(());
        };

        Err(WorkerErr::Config(reason.to_string()))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the part of the configuration describing the registry.
    pub fn registry(&self) -> RegistryConfig {
        RegistryConfig {
            host: self.host.clone(),
            query_path: self.query_path.clone(),
            publish_path: self.publish_path.clone(),
            timeout: self.timeout(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| WorkerErr::Config(format!("{key} is not a number: {value:?}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults() {
        let config = WorkerConfig::default();

        assert_eq!(config.interval(), Duration::from_secs(1800));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.board.widths(), [32, 14, 4]);
        assert_eq!(config.policy, RemotePolicy::FailOpen);
        config.validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: WorkerConfig =
            serde_json::from_str(r#"{ "host": "ratings.example.org", "board": { "cols": 7 } }"#)
                .unwrap();

        assert_eq!(config.host, "ratings.example.org");
        assert_eq!(config.board.cols, 7);
        assert_eq!(config.board.rows, 7);
        assert_eq!(config.query_path, DEFAULT_QUERY_PATH);
    }

    #[test]
    fn environment_overrides_fields() {
        let vars = HashMap::from([
            ("HOST", "10.0.0.2:8080"),
            ("INTERVAL_SECS", "60"),
            ("BATCH_SIZE", " 25 "),
            ("EXAMPLES_DIR", "/var/spool/moves"),
        ]);

        let config = WorkerConfig::default()
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.host, "10.0.0.2:8080");
        assert_eq!(config.interval(), Duration::from_secs(60));
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.examples_dir, PathBuf::from("/var/spool/moves"));
        assert_eq!(config.publish_path, DEFAULT_PUBLISH_PATH);
    }

    #[test]
    fn bad_numeric_override_fails() {
        let err = WorkerConfig::default()
            .with_overrides(|key| (key == "BATCH_SIZE").then(|| "ten".to_string()))
            .unwrap_err();

        assert!(matches!(err, WorkerErr::Config(_)));
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        let mut zero_batch = WorkerConfig::default();
        zero_batch.batch_size = 0;

        let mut flat_range = WorkerConfig::default();
        flat_range.board.max_cell = flat_range.board.min_cell;

        let mut no_host = WorkerConfig::default();
        no_host.host = " ".into();

        for config in [zero_batch, flat_range, no_host] {
            assert!(matches!(config.validate(), Err(WorkerErr::Config(_))));
        }
    }
}
