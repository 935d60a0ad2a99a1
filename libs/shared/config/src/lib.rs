use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub notify_webhook_url: Option<String>,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok(),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty()
    }

    pub fn is_notification_configured(&self) -> bool {
        self.notify_webhook_url
            .as_deref()
            .map(|url| !url.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(jwt_secret: &str, webhook: Option<&str>) -> AppConfig {
        AppConfig {
            jwt_secret: jwt_secret.to_string(),
            notify_webhook_url: webhook.map(|u| u.to_string()),
            port: 3000,
        }
    }

    #[test]
    fn test_is_configured_requires_jwt_secret() {
        assert!(config("secret", None).is_configured());
        assert!(!config("", None).is_configured());
    }

    #[test]
    fn test_is_notification_configured() {
        assert!(config("s", Some("https://hooks.example/x")).is_notification_configured());
        assert!(!config("s", Some("")).is_notification_configured());
        assert!(!config("s", None).is_notification_configured());
    }
}
