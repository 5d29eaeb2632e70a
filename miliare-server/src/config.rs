//! Server configuration

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// SQLite database path; in-memory stores when unset
    pub database: Option<String>,

    /// Principals registering with one of these emails join the `admin` group
    #[serde(default)]
    pub admin_emails: Vec<String>,

    /// Where gated dashboard views send principals who lack access
    pub default_view: String,

    /// Where gated dashboard views send anonymous visitors
    pub login_view: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database: None,
            admin_emails: Vec::new(),
            default_view: "/app/dashboard".to_string(),
            login_view: "/login".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `MILIARE_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("MILIARE_PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Ignoring invalid MILIARE_PORT");
                defaults.port
            }),
            None => defaults.port,
        };

        Self {
            port,
            database: lookup("MILIARE_DATABASE").filter(|p| !p.trim().is_empty()),
            admin_emails: lookup("MILIARE_ADMIN_EMAILS")
                .map(|raw| parse_email_list(&raw))
                .unwrap_or_default(),
            default_view: lookup("MILIARE_DEFAULT_VIEW").unwrap_or(defaults.default_view),
            login_view: lookup("MILIARE_LOGIN_VIEW").unwrap_or(defaults.login_view),
        }
    }

    /// Whether `email` is on the bootstrap admin list (case-insensitive)
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
