use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "LIBRIS_ENV";
const CONFIG_DIR_ENV: &str = "LIBRIS_CONFIG_DIR";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub library: LibrarySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .with_context(|| "unable to resolve current directory")?
                .join("config"),
        };

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(config::Environment::with_prefix("LIBRIS").separator("__"));

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = match environment.as_str() {
            "local" => Environment::Local,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(anyhow!(
                    "unsupported environment '{}'; expected local/staging/production",
                    other
                ));
            }
        };

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_url")]
    pub url: String,
    #[serde(default = "DatabaseSettings::default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseSettings {
    fn default_url() -> String {
        "sqlite://libris.db".to_string()
    }

    fn default_max_connections() -> u32 {
        5
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            max_connections: Self::default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info,tower_http=info,sqlx=warn".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "AuthSettings::default_session_cookie")]
    pub session_cookie: String,
    #[serde(default = "AuthSettings::default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    #[serde(default = "AuthSettings::default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl AuthSettings {
    fn default_session_cookie() -> String {
        "libris_session".to_string()
    }

    fn default_session_ttl_hours() -> i64 {
        12
    }

    fn default_bcrypt_cost() -> u32 {
        10
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_cookie: Self::default_session_cookie(),
            session_ttl_hours: Self::default_session_ttl_hours(),
            bcrypt_cost: Self::default_bcrypt_cost(),
        }
    }
}

/// Circulation rules shared by the workflow, fine and notification code.
#[derive(Debug, Clone, Deserialize)]
pub struct LibrarySettings {
    /// Open issues plus pending requests a reader may hold at once.
    #[serde(default = "LibrarySettings::default_max_issued_per_reader")]
    pub max_issued_per_reader: i64,
    #[serde(default = "LibrarySettings::default_fine_per_day")]
    pub fine_per_day: i64,
    #[serde(default = "LibrarySettings::default_student_loan_days")]
    pub student_loan_days: i64,
    #[serde(default = "LibrarySettings::default_staff_loan_days")]
    pub staff_loan_days: i64,
    /// Upper bound for an explicitly chosen due date, counted from the issue date.
    #[serde(default = "LibrarySettings::default_max_custom_loan_days")]
    pub max_custom_loan_days: i64,
    #[serde(default = "LibrarySettings::default_due_soon_days")]
    pub due_soon_days: i64,
    #[serde(default = "LibrarySettings::default_analytics_window_days")]
    pub analytics_window_days: i64,
    #[serde(default = "LibrarySettings::default_page_size")]
    pub page_size: i64,
    #[serde(default = "LibrarySettings::default_max_active_admins")]
    pub max_active_admins: i64,
    #[serde(default = "LibrarySettings::default_temporary_password")]
    pub temporary_password: String,
}

impl LibrarySettings {
    fn default_max_issued_per_reader() -> i64 {
        5
    }

    fn default_fine_per_day() -> i64 {
        2
    }

    fn default_student_loan_days() -> i64 {
        14
    }

    fn default_staff_loan_days() -> i64 {
        182
    }

    fn default_max_custom_loan_days() -> i64 {
        30
    }

    fn default_due_soon_days() -> i64 {
        2
    }

    fn default_analytics_window_days() -> i64 {
        90
    }

    fn default_page_size() -> i64 {
        20
    }

    fn default_max_active_admins() -> i64 {
        5
    }

    fn default_temporary_password() -> String {
        "temp123".to_string()
    }
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            max_issued_per_reader: Self::default_max_issued_per_reader(),
            fine_per_day: Self::default_fine_per_day(),
            student_loan_days: Self::default_student_loan_days(),
            staff_loan_days: Self::default_staff_loan_days(),
            max_custom_loan_days: Self::default_max_custom_loan_days(),
            due_soon_days: Self::default_due_soon_days(),
            analytics_window_days: Self::default_analytics_window_days(),
            page_size: Self::default_page_size(),
            max_active_admins: Self::default_max_active_admins(),
            temporary_password: Self::default_temporary_password(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_database_is_local_sqlite_file() {
        let settings = Settings::default();
        assert_eq!(settings.database.url, "sqlite://libris.db");
    }

    #[test]
    fn default_circulation_rules() {
        let library = LibrarySettings::default();
        assert_eq!(library.max_issued_per_reader, 5);
        assert_eq!(library.fine_per_day, 2);
        assert_eq!(library.student_loan_days, 14);
        assert_eq!(library.staff_loan_days, 182);
        assert_eq!(library.max_custom_loan_days, 30);
    }

    #[test]
    fn partial_library_section_keeps_other_defaults() {
        let cfg = config::Config::builder()
            .set_override("library.fine_per_day", 5)
            .unwrap()
            .build()
            .unwrap();
        let settings: Settings = cfg.try_deserialize().unwrap();
        assert_eq!(settings.library.fine_per_day, 5);
        assert_eq!(settings.library.max_issued_per_reader, 5);
        assert_eq!(settings.auth.session_cookie, "libris_session");
    }
}
