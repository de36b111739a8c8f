use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use serde::Deserialize;
use std::net::SocketAddr;
use wayfarer::providers::anthropic::{AnthropicConfig, ANTHROPIC_DEFAULT_HOST};
use wayfarer::tools::ToolSettings;

#[derive(Debug, Default, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| {
                ConfigError::Other(config::ConfigError::Message(format!(
                    "invalid server address: {e}"
                )))
            })
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_provider_host")]
    pub host: String,
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i32,
}

impl ProviderSettings {
    pub fn into_config(self) -> AnthropicConfig {
        AnthropicConfig {
            host: self.host,
            api_key: self.api_key,
            model: self.model,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ToolsSettings {
    #[serde(default = "default_search_host")]
    pub search_host: String,
    pub search_api_key: String,
    #[serde(default = "default_maps_host")]
    pub maps_host: String,
    pub maps_api_key: String,
}

impl ToolsSettings {
    pub fn into_settings(self) -> ToolSettings {
        let mut settings = ToolSettings::new(self.search_api_key, self.maps_api_key);
        settings.search_host = self.search_host;
        settings.maps_host = self.maps_host;
        settings
    }
}

#[derive(Debug, Deserialize)]
pub struct AssistantSettings {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SegmenterSettings {
    #[serde(default = "default_segmenter_url")]
    pub url: String,
}

impl Default for SegmenterSettings {
    fn default() -> Self {
        Self {
            url: default_segmenter_url(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TourGuideSettings {
    #[serde(default = "default_tourguide_url")]
    pub url: String,
}

impl Default for TourGuideSettings {
    fn default() -> Self {
        Self {
            url: default_tourguide_url(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LocationSettings {
    #[serde(default = "default_location_host")]
    pub host: String,
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            host: default_location_host(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    pub tools: ToolsSettings,
    #[serde(default)]
    pub assistant: AssistantSettings,
    #[serde(default)]
    pub segmenter: SegmenterSettings,
    #[serde(default)]
    pub tourguide: TourGuideSettings,
    #[serde(default)]
    pub location: LocationSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("WAYFARER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match config.try_deserialize::<Self>() {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("configuration error: {:?}", &err);

                // Surface missing settings as the env var the user should set.
                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_provider_host() -> String {
    ANTHROPIC_DEFAULT_HOST.to_string()
}

fn default_model() -> String {
    "claude-3-5-haiku-latest".to_string()
}

fn default_max_tokens() -> i32 {
    4096
}

fn default_search_host() -> String {
    "https://api.tavily.com".to_string()
}

fn default_maps_host() -> String {
    "https://maps.googleapis.com".to_string()
}

fn default_max_rounds() -> u32 {
    10
}

fn default_segmenter_url() -> String {
    "http://127.0.0.1:8001/sam".to_string()
}

fn default_tourguide_url() -> String {
    "http://127.0.0.1:8002/tourguide".to_string()
}

fn default_location_host() -> String {
    "http://ip-api.com".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("WAYFARER_") {
                env::remove_var(&key);
            }
        }
    }

    fn set_required() {
        env::set_var("WAYFARER_PROVIDER__API_KEY", "anthropic-key");
        env::set_var("WAYFARER_TOOLS__SEARCH_API_KEY", "search-key");
        env::set_var("WAYFARER_TOOLS__MAPS_API_KEY", "maps-key");
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();
        set_required();

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.provider.host, "https://api.anthropic.com");
        assert_eq!(settings.provider.model, "claude-3-5-haiku-latest");
        assert_eq!(settings.provider.max_tokens, 4096);
        assert_eq!(settings.assistant.max_rounds, 10);
        assert_eq!(settings.tools.search_host, "https://api.tavily.com");
        assert_eq!(settings.tourguide.url, "http://127.0.0.1:8002/tourguide");

        clean_env();
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        set_required();
        env::set_var("WAYFARER_SERVER__PORT", "9090");
        env::set_var("WAYFARER_PROVIDER__MODEL", "claude-3-5-sonnet-latest");
        env::set_var("WAYFARER_ASSISTANT__MAX_ROUNDS", "4");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.provider.model, "claude-3-5-sonnet-latest");
        assert_eq!(settings.assistant.max_rounds, 4);

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_api_key_names_env_var() {
        clean_env();
        env::set_var("WAYFARER_TOOLS__SEARCH_API_KEY", "search-key");
        env::set_var("WAYFARER_TOOLS__MAPS_API_KEY", "maps-key");

        let err = Settings::new().unwrap_err();
        match err {
            ConfigError::MissingEnvVar { env_var } => {
                assert!(env_var.starts_with("WAYFARER_"));
            }
            other => panic!("expected MissingEnvVar, got {other:?}"),
        }

        clean_env();
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 8000,
        };
        let addr = server_settings.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:8000");
    }
}
