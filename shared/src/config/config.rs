use std::fs;
use tracing::{debug, error, info};

use crate::types::server_config::{AppConfig, ConfigError};

/// Shortest signing secret accepted at start-up.
pub const MIN_SECRET_LEN: usize = 32;

/// Longest token lifetime accepted, one year.
pub const MAX_TOKEN_EXPIRY_MINUTES: u64 = 365 * 24 * 60;

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    info!("Loading configuration from: {}", path);

    let contents = fs::read_to_string(path)?;
    debug!("Processing file: {}", path);

    parse_config(&contents)
}

/// Parse and validate configuration text.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    if contents.trim().is_empty() {
        error!("Configuration file is empty");
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }

    let config: AppConfig = toml::from_str(contents)?;

    info!("Configuration loaded successfully");
    debug!(
        "Config: bind={}, database={}, token_expiry_minutes={}",
        config.server.addr(),
        config.database.url,
        config.auth.token_expiry_minutes
    );

    validate_config(&config)?;

    info!("Config validated");

    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.auth.token_expiry_minutes == 0 {
        return Err(ConfigError::InvalidConfig(
            "token_expiry_minutes must be greater than 0".into(),
        ));
    }

    if config.auth.token_expiry_minutes > MAX_TOKEN_EXPIRY_MINUTES {
        return Err(ConfigError::InvalidConfig(format!(
            "token_expiry_minutes must be at most {}",
            MAX_TOKEN_EXPIRY_MINUTES
        )));
    }

    if config.server.max_connections == 0 {
        return Err(ConfigError::InvalidConfig(
            "max_connections must be greater than 0".into(),
        ));
    }

    if config.database.pool_size == 0 {
        return Err(ConfigError::InvalidConfig(
            "database.pool_size must be greater than 0".into(),
        ));
    }

    // Rejected here so a bad config fails at start-up rather than at the
    // first login.
    match config.auth.resolved_jwt_secret() {
        None => return Err(ConfigError::MissingSecret),
        Some(secret) if secret.len() < MIN_SECRET_LEN => {
            return Err(ConfigError::InvalidConfig(format!(
                "jwt_secret must be at least {} bytes long",
                MIN_SECRET_LEN
            )));
        }
        _ => {}
    }

    if let Some(admin) = &config.auth.bootstrap_admin {
        if admin.username.trim().is_empty() || admin.password.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "bootstrap_admin needs a username and a password".into(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SECRET_LINE: &str = "jwt_secret = \"0123456789abcdef0123456789abcdef\"";

    fn env_secret_set() -> bool {
        std::env::var("JWT_SECRET").map(|s| !s.is_empty()).unwrap_or(false)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = parse_config(&format!("[auth]\n{}\n", SECRET_LINE)).unwrap();
        assert_eq!(cfg.server.addr(), "127.0.0.1:8080");
        assert_eq!(cfg.auth.token_expiry_minutes, 1440);
        assert_eq!(cfg.auth.token_expiry_secs(), 86_400);
        assert!(cfg.cors.allowed_origins.is_empty());
        assert!(cfg.auth.bootstrap_admin.is_none());
    }

    #[test]
    fn empty_file_is_rejected() {
        assert!(matches!(
            parse_config("   \n"),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn missing_secret_is_reported() {
        if env_secret_set() {
            return;
        }
        assert!(matches!(
            parse_config("[auth]\ntoken_expiry_minutes = 5\n"),
            Err(ConfigError::MissingSecret)
        ));
    }

    #[test]
    fn short_secret_is_rejected() {
        if env_secret_set() {
            return;
        }
        assert!(matches!(
            parse_config("[auth]\njwt_secret = \"short\"\n"),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_expiry_is_rejected() {
        let text = format!("[auth]\n{}\ntoken_expiry_minutes = 0\n", SECRET_LINE);
        assert!(matches!(
            parse_config(&text),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        assert!(matches!(
            parse_config("[auth\n"),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn loads_full_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
bind = "0.0.0.0"
port = 9000

[database]
url = "sqlite::memory:"

[auth]
{}
token_expiry_minutes = 30

[auth.bootstrap_admin]
username = "root"
password = "changeme"
email = "root@example.com"

[cors]
allowed_origins = ["https://example.com"]
"#,
            SECRET_LINE
        )
        .unwrap();

        let cfg = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.server.addr(), "0.0.0.0:9000");
        assert_eq!(cfg.database.url, "sqlite::memory:");
        assert_eq!(cfg.auth.token_expiry_secs(), 1800);
        let admin = cfg.auth.bootstrap_admin.unwrap();
        assert_eq!(admin.username, "root");
        assert_eq!(admin.full_name, "Administrator");
        assert!(cfg.cors.allows("https://example.com"));
        assert!(!cfg.cors.allows("https://evil.example"));
    }

    #[test]
    fn oversized_expiry_is_rejected() {
        let text = format!(
            "[auth]\n{}\ntoken_expiry_minutes = {}\n",
            SECRET_LINE,
            i64::MAX
        );
        assert!(matches!(
            parse_config(&text),
            Err(ConfigError::InvalidConfig(_))
        ));

        let text = format!(
            "[auth]\n{}\ntoken_expiry_minutes = {}\n",
            SECRET_LINE,
            MAX_TOKEN_EXPIRY_MINUTES + 1
        );
        assert!(parse_config(&text).is_err());
    }

    #[test]
    fn one_year_expiry_is_accepted() {
        let text = format!(
            "[auth]\n{}\ntoken_expiry_minutes = {}\n",
            SECRET_LINE, MAX_TOKEN_EXPIRY_MINUTES
        );
        let cfg = parse_config(&text).unwrap();
        assert_eq!(cfg.auth.token_expiry_secs(), 365 * 24 * 3600);
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            load_config("/definitely/not/here.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
