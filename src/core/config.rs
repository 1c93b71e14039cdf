//! Configuration management for Toolchat
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/toolchat/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::core::error::{Result, ToolchatError};

/// Main configuration for Toolchat
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Listen addresses
    #[serde(default)]
    pub server: ServerConfig,
    /// Remote tool host the chat side connects to
    #[serde(default)]
    pub tool_host: ToolHostConfig,
    /// LLM provider configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Agentic loop configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// Tool host session lifecycle
    #[serde(default)]
    pub sessions: SessionConfig,
    /// Weather tool backend
    #[serde(default)]
    pub weather: WeatherConfig,
}

/// Listen address configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host (default: 127.0.0.1)
    pub host: String,
    /// Port of the chat endpoint (default: 3001)
    pub chat_port: u16,
    /// Port of the tool host (default: 3000)
    pub tool_host_port: u16,
}

/// Tool host client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolHostConfig {
    /// Streamable HTTP endpoint of the tool host
    pub url: Url,
    /// Timeout for a single RPC round trip in seconds
    pub timeout_secs: u64,
    /// Timeout for a single tool call in seconds
    pub tool_timeout_secs: u64,
    /// Protocol version sent in `initialize`
    pub protocol_version: String,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,
    /// API key, required by the chat side
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model used for tool calling
    /// Default: gpt-4o
    pub model: String,
    /// Maximum tokens per completion
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Agent behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum LLM rounds before the loop gives up
    /// Default: 10
    pub max_rounds: usize,
    /// Dispatch the tool calls of one round concurrently
    pub parallel_tools: bool,
    /// Whether to show debug output
    pub debug: bool,
    /// System prompt prefix
    pub system_prompt: Option<String>,
}

/// Session lifecycle configuration for the tool host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session is closed; 0 disables eviction
    pub idle_ttl_secs: u64,
    /// How often the reaper looks for idle sessions
    pub reap_interval_secs: u64,
}

/// Weather tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Base URL queried as `<api_url>/<city>`
    pub api_url: String,
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key).ok().map(|v| v == "true" || v == "1")
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: env::var("TOOLCHAT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            chat_port: env_parse("TOOLCHAT_CHAT_PORT").unwrap_or(3001),
            tool_host_port: env_parse("TOOLCHAT_TOOL_HOST_PORT").unwrap_or(3000),
        }
    }
}

impl Default for ToolHostConfig {
    fn default() -> Self {
        Self {
            url: env_parse("MCP_URL").unwrap_or_else(default_tool_host_url),
            timeout_secs: 30,
            tool_timeout_secs: 60,
            protocol_version: "2025-03-26".to_string(),
        }
    }
}

fn default_tool_host_url() -> Url {
    Url::parse("http://127.0.0.1:3000/mcp").expect("default tool host URL is valid")
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: env::var("TOOLCHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            max_tokens: 1000,
            timeout_secs: 120,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: env_parse("TOOLCHAT_MAX_ROUNDS").unwrap_or(10),
            parallel_tools: env_flag("TOOLCHAT_PARALLEL_TOOLS").unwrap_or(false),
            debug: env_flag("TOOLCHAT_DEBUG").unwrap_or(false),
            system_prompt: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 1800,
            reap_interval_secs: 60,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_url: env::var("WEATHER_API_URL")
                .unwrap_or_else(|_| "https://api.weather.com".to_string()),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("toolchat")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        if let Ok(config) = Self::load_from_file(&Self::config_file()) {
            return config.with_env_overrides();
        }

        // Fall back to defaults (which respect env vars)
        Self::default()
    }

    /// Let environment variables win over values read from a file
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = env::var("TOOLCHAT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse("TOOLCHAT_CHAT_PORT") {
            self.server.chat_port = port;
        }
        if let Some(port) = env_parse("TOOLCHAT_TOOL_HOST_PORT") {
            self.server.tool_host_port = port;
        }
        if let Some(url) = env_parse("MCP_URL") {
            self.tool_host.url = url;
        }
        if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Some(key) = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()) {
            self.llm.api_key = Some(key);
        }
        if let Ok(model) = env::var("TOOLCHAT_MODEL") {
            self.llm.model = model;
        }
        if let Some(max_rounds) = env_parse("TOOLCHAT_MAX_ROUNDS") {
            self.agent.max_rounds = max_rounds;
        }
        if let Some(parallel) = env_flag("TOOLCHAT_PARALLEL_TOOLS") {
            self.agent.parallel_tools = parallel;
        }
        if let Some(debug) = env_flag("TOOLCHAT_DEBUG") {
            self.agent.debug = debug;
        }
        if let Ok(api_url) = env::var("WEATHER_API_URL") {
            self.weather.api_url = api_url;
        }
        self
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolchatError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ToolchatError::config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ToolchatError::config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to the default file and return the path
    pub fn save(&self) -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| ToolchatError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ToolchatError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| ToolchatError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&Config::default())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }

    /// Reject settings the agent loop and tool invoker cannot run with
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("agent.max_rounds", self.agent.max_rounds as u64),
            ("tool_host.timeout_secs", self.tool_host.timeout_secs),
            ("tool_host.tool_timeout_secs", self.tool_host.tool_timeout_secs),
            ("llm.timeout_secs", self.llm.timeout_secs),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ToolchatError::config(format!("{} must be at least 1", key)));
            }
        }
        Ok(())
    }

    /// API key for the LLM, or a config error naming the variable to set
    pub fn require_api_key(&self) -> Result<&str> {
        self.llm
            .api_key
            .as_deref()
            .ok_or_else(|| ToolchatError::config("OPENAI_API_KEY is not set"))
    }

    /// Bind address of the chat endpoint
    pub fn chat_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.chat_port)
    }

    /// Bind address of the tool host
    pub fn tool_host_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.tool_host_port)
    }
}

impl ToolHostConfig {
    /// Per-call tool timeout
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

impl SessionConfig {
    /// Idle TTL, or `None` when eviction is disabled
    pub fn idle_ttl(&self) -> Option<Duration> {
        (self.idle_ttl_secs > 0).then(|| Duration::from_secs(self.idle_ttl_secs))
    }
}
