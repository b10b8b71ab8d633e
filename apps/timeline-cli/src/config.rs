use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

impl CliConfig {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let log_format = match std::env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "text".to_string())
            .to_lowercase()
            .as_str()
        {
            "text" | "pretty" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => return Err(format!("unsupported LOG_FORMAT: {}", other).into()),
        };

        Ok(CliConfig {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
        })
    }
}
