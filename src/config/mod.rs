use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub jwt_expiration_secs: u64,
    pub refresh_token_expiration_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub cors_origin: Option<String>,
    pub cookie_secure: bool,
    pub profile_default_image: Option<String>,
    pub storage_url: Option<String>,
    pub storage_service_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET")?;
        let jwt_expiration = optional("JWT_EXPIRATION")
            .and_then(|v| v.trim_end_matches('h').parse::<u64>().ok())
            .unwrap_or(24);
        let refresh_days = optional("REFRESH_TOKEN_EXPIRATION_DAYS")
            .and_then(|v| v.trim_end_matches('d').parse::<u64>().ok())
            .unwrap_or(30);
        let cors_origin = optional("CORS_ORIGIN");
        // https front-ends are cross-site, so the refresh cookie has to be Secure
        let cookie_secure = optional("COOKIE_SECURE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or_else(|| {
                cors_origin
                    .as_deref()
                    .is_some_and(|origin| origin.starts_with("https://"))
            });

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: optional("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1/".into()),
            jwt_refresh_secret: optional("JWT_REFRESH_SECRET").unwrap_or_else(|| jwt_secret.clone()),
            jwt_secret,
            jwt_expiration_secs: jwt_expiration * 3600,
            refresh_token_expiration_secs: refresh_days * 24 * 3600,
            rate_limit_window_secs: optional("RATE_LIMIT_WINDOW")
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            rate_limit_requests: optional("RATE_LIMIT_REQUESTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            server_host: optional("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port: optional("SERVER_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            api_base_uri: optional("API_BASE_URI").unwrap_or_else(|| "/api".into()),
            cors_origin,
            cookie_secure,
            profile_default_image: optional("PROFILE_DEFAULT_IMAGE"),
            storage_url: optional("STORAGE_URL"),
            storage_service_key: optional("STORAGE_SERVICE_KEY"),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn refresh_token_expiration(&self) -> Duration {
        Duration::from_secs(self.refresh_token_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
