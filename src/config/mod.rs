use rowsift::dsl::Grammar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_BATCH_SIZE: usize = 8_192;

/// Named filters loaded from a YAML file.
#[derive(Debug, Deserialize)]
pub struct FiltersConfig {
    pub filters: BTreeMap<String, String>,
    #[serde(default)]
    pub grammar: Option<Grammar>,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

impl FiltersConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn filter(&self, name: &str) -> anyhow::Result<&str> {
        self.filters.get(name).map(String::as_str).ok_or_else(|| {
            let known: Vec<&str> = self.filters.keys().map(String::as_str).collect();
            anyhow::anyhow!(
                "Config: Unknown filter '{}' (available: {})",
                name,
                known.join(", ")
            )
        })
    }
}

/// Settings resolved from the CLI over the config file.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub filter: String,
    pub grammar: Grammar,
    pub batch_size: usize,
    pub limit: Option<usize>,
    pub input_format: InputFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Jsonl,
    Parquet,
}

impl InputFormat {
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        ext.parse().ok()
    }

    pub fn label(&self) -> &'static str {
        match self {
            InputFormat::Jsonl => "jsonl",
            InputFormat::Parquet => "parquet",
        }
    }
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "jsonl" | "ndjson" | "json" => Ok(InputFormat::Jsonl),
            "parquet" => Ok(InputFormat::Parquet),
            _ => Err(format!("invalid input format: {value}")),
        }
    }
}
