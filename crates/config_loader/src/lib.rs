//! # Config Loader
//!
//! 配置加载与解析模块。
//!
//! ## 职责
//! - 解析 TOML/JSON 配置文件
//! - 校验配置合法性
//! - 生成 `NodeConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("node.toml")).unwrap();
//! println!("Node: {}", config.node.name);
//! ```

mod parser;
mod validator;

pub use contracts::NodeConfig;
pub use parser::ConfigFormat;

use contracts::NodeError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<NodeConfig, NodeError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<NodeConfig, NodeError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate an already-built configuration (CLI overrides)
    pub fn validate(config: &NodeConfig) -> Result<(), NodeError> {
        validator::validate(config)
    }

    /// Serialize NodeConfig to TOML string
    pub fn to_toml(config: &NodeConfig) -> Result<String, NodeError> {
        toml::to_string_pretty(config)
            .map_err(|e| NodeError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize NodeConfig to JSON string
    pub fn to_json(config: &NodeConfig) -> Result<String, NodeError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| NodeError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, NodeError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| NodeError::config_parse("cannot determine file format from extension"))?;

        ConfigFormat::from_extension(ext)
            .ok_or_else(|| NodeError::config_parse(format!("unsupported config format: .{ext}")))
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, NodeError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(content: &str, format: ConfigFormat) -> Result<NodeConfig, NodeError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }
}
