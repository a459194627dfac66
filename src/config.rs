use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::model::chart::ChartDimensions;
use crate::storage::StorageConfig;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub github: Option<GitHubConfig>,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub organization: String,
    pub project_regex: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ChartConfig {
    pub default_dimensions: Option<String>,
}

impl ChartConfig {
    pub fn dimensions(&self) -> Result<ChartDimensions> {
        match &self.default_dimensions {
            Some(raw) => raw
                .parse()
                .with_context(|| "Invalid chart.default_dimensions in config.toml"),
            None => Ok(ChartDimensions::default()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_minutes: u64,
    pub weekdays_only: bool,
    pub start_hour: u32,
    pub end_hour: u32,
    pub utc_offset_hours: i32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 120,
            weekdays_only: true,
            start_hour: 6,
            end_hour: 18,
            utc_offset_hours: -6,
        }
    }
}

fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("BURNDOWN_CONFIG") {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".burndown")
        .join("config.toml")
}

pub fn load_config() -> Result<AppConfig> {
    let path = config_path();
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        parse_config(&contents)?
    } else {
        AppConfig::default()
    };

    if let Some(github) = config.github.as_mut() {
        if github.token.is_none() {
            github.token = std::env::var("GITHUB_TOKEN").ok();
        }
    }
    Ok(config)
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).with_context(|| "Failed to parse config.toml")
}
