// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::Path;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_max_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://encore.db".to_string(),
            pool_max_size: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub api_base_url: Option<String>,
    pub accounts_base_url: Option<String>,
    /// Market passed to top-track and discography lookups.
    pub market: String,
    /// Playlist that newly rated tracks are appended to.
    pub liked_playlist_id: Option<String>,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://127.0.0.1:3000/auth/callback".to_string(),
            api_base_url: None,
            accounts_base_url: None,
            market: "from_token".to_string(),
            liked_playlist_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LastFmConfig {
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Sheets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    pub songs_spreadsheet_id: String,
    pub albums_spreadsheet_id: String,
    /// Spreadsheet holding the artist and related-artist tabs.
    pub library_spreadsheet_id: String,
    pub songs_sheet: String,
    pub albums_sheet: String,
    pub artists_sheet: String,
    pub related_sheet: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            access_token: None,
            songs_spreadsheet_id: String::new(),
            albums_spreadsheet_id: String::new(),
            library_spreadsheet_id: String::new(),
            songs_sheet: "Songs".to_string(),
            albums_sheet: "Albums".to_string(),
            artists_sheet: "Artists".to_string(),
            related_sheet: "RelatedArtists".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub sheets: SheetsConfig,
}

/// Whether generated related artists are written before or after the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceMode {
    Foreground,
    #[default]
    Background,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Persisted related artists needed before the generator is skipped.
    pub min_related: usize,
    /// Number of candidates requested from the generator.
    pub target_count: usize,
    pub persistence: PersistenceMode,
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            min_related: 5,
            target_count: 5,
            persistence: PersistenceMode::Background,
            cache_ttl_secs: 60 * 60,
            cache_capacity: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub telemetry: TelemetryConfig,
    pub spotify: SpotifyConfig,
    pub lastfm: LastFmConfig,
    pub gemini: GeminiConfig,
    pub storage: StorageConfig,
    pub recommendations: RecommendationConfig,
}

/// Load configuration from defaults, optional TOML file, and environment overrides (prefix: ENCORE_).
pub fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("ENCORE_").split("__"));

    let config: AppConfig = figment.extract()?;
    info!(
        target: "config",
        backend = ?config.storage.backend,
        persistence = ?config.recommendations.persistence,
        "configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_match_dashboard_behaviour() {
        let config = AppConfig::default();
        assert_eq!(config.recommendations.min_related, 5);
        assert_eq!(config.recommendations.target_count, 5);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
    }

    #[test]
    fn toml_and_env_layers_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "encore.toml",
                r#"
                [storage]
                backend = "sheets"

                [recommendations]
                persistence = "foreground"
                "#,
            )?;
            jail.set_env("ENCORE_HTTP__PORT", "8080");
            jail.set_env("ENCORE_SPOTIFY__MARKET", "JP");

            let config = load(Some(Path::new("encore.toml"))).expect("config loads");
            assert_eq!(config.storage.backend, StorageBackend::Sheets);
            assert_eq!(
                config.recommendations.persistence,
                PersistenceMode::Foreground
            );
            assert_eq!(config.http.port, 8080);
            assert_eq!(config.spotify.market, "JP");
            Ok(())
        });
    }
}
