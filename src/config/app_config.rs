//! Layered configuration for protgraph
//!
//! Supports loading config from (lowest to highest priority):
//! - ~/.config/protgraph/config.toml
//! - ./protgraph.toml
//! - an explicit `--config` path
//! - environment variables

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::graph::ComponentPolicy;

/// Project-level config file name
pub const PROJECT_CONFIG_FILE: &str = "protgraph.toml";

const DEFAULT_PROGRAM: &str = "java";
const DEFAULT_ENGINE_JAR: &str = "gephi/target/gephi.backend-1.0-SNAPSHOT.jar";
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_RETRIES: u32 = 1;

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub graph: GraphConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct LayoutConfig {
    /// Executable that runs the layout engine (default: java)
    pub program: Option<String>,

    /// Arguments passed before stdin is fed (default: -jar <engine jar>)
    pub args: Option<Vec<String>>,

    /// Seconds to wait for the engine; 0 waits forever (default: 300)
    pub timeout_secs: Option<u64>,

    /// Extra attempts after a failed run (default: 1)
    pub retries: Option<u32>,
}

impl LayoutConfig {
    pub fn program(&self) -> &str {
        self.program.as_deref().unwrap_or(DEFAULT_PROGRAM)
    }

    pub fn args(&self) -> Vec<String> {
        match &self.args {
            Some(args) => args.clone(),
            None => vec!["-jar".to_string(), DEFAULT_ENGINE_JAR.to_string()],
        }
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    pub fn retries(&self) -> u32 {
        self.retries.unwrap_or(DEFAULT_RETRIES)
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct GraphConfig {
    /// "all-connected" (default) or "largest-only"
    pub component_policy: Option<ComponentPolicy>,
}

impl GraphConfig {
    pub fn component_policy(&self) -> ComponentPolicy {
        self.component_policy.unwrap_or_default()
    }
}

impl AppConfig {
    /// Load config from all sources.
    ///
    /// Broken user/project files are skipped with a warning; an explicit
    /// path that cannot be read or parsed is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = AppConfig::default();

        if let Some(user) = Self::user_config_path().and_then(|p| Self::load_optional(&p)) {
            config.merge(user);
        }

        if let Some(project) = Self::load_optional(Path::new(PROJECT_CONFIG_FILE)) {
            config.merge(project);
        }

        if let Some(path) = explicit {
            config.merge(Self::load_file(path)?);
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a config file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn load_optional(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match Self::load_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Ignoring config {}: {:#}", path.display(), e);
                None
            }
        }
    }

    /// Get the user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("protgraph").join("config.toml"))
    }

    /// Merge another config into this one (other takes priority)
    fn merge(&mut self, other: AppConfig) {
        if other.layout.program.is_some() {
            self.layout.program = other.layout.program;
        }
        if other.layout.args.is_some() {
            self.layout.args = other.layout.args;
        }
        if other.layout.timeout_secs.is_some() {
            self.layout.timeout_secs = other.layout.timeout_secs;
        }
        if other.layout.retries.is_some() {
            self.layout.retries = other.layout.retries;
        }
        if other.graph.component_policy.is_some() {
            self.graph.component_policy = other.graph.component_policy;
        }
    }

    /// Apply environment overrides through `lookup`
    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(program) = lookup("PROTGRAPH_LAYOUT_PROGRAM").filter(|p| !p.is_empty()) {
            self.layout.program = Some(program);
        }
        if let Some(raw) = lookup("PROTGRAPH_LAYOUT_TIMEOUT") {
            match raw.trim().parse() {
                Ok(secs) => self.layout.timeout_secs = Some(secs),
                Err(_) => warn!("Ignoring PROTGRAPH_LAYOUT_TIMEOUT={:?}: not a number", raw),
            }
        }
    }

    /// Write an example project config into `dir` unless one exists.
    pub fn init_project_config(dir: &Path) -> Result<PathBuf> {
        let config_path = dir.join(PROJECT_CONFIG_FILE);
        if !config_path.exists() {
            let example = format!(
                r#"# protgraph configuration

[layout]
# Executable and arguments that run the layout engine.
# The engine reads node/edge tables on stdin and prints JSON on stdout.
program = "{program}"
args = ["-jar", "{jar}"]

# Seconds before the engine is killed (0 = wait forever)
timeout_secs = {timeout}

# Extra attempts after a failed run
retries = {retries}

[graph]
# "all-connected": every component with an edge is principal
# "largest-only": only the biggest component is principal
component_policy = "all-connected"
"#,
                program = DEFAULT_PROGRAM,
                jar = DEFAULT_ENGINE_JAR,
                timeout = DEFAULT_TIMEOUT_SECS,
                retries = DEFAULT_RETRIES,
            );
            std::fs::write(&config_path, example)
                .with_context(|| format!("Failed to write {}", config_path.display()))?;
        }
        Ok(config_path)
    }
}
