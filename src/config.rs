use anyhow::Context;
use serde::Deserialize;
use std::net::SocketAddr;

/// Superuser created on startup when it does not exist yet.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapSuperuser {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub bootstrap: Option<BootstrapSuperuser>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = std::env::var("APP_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);
        let bootstrap = match (
            std::env::var("BOOTSTRAP_SUPERUSER_EMAIL"),
            std::env::var("BOOTSTRAP_SUPERUSER_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) if !email.trim().is_empty() => {
                Some(BootstrapSuperuser { email, password })
            }
            _ => None,
        };
        Ok(Self {
            database_url,
            max_connections,
            host,
            port,
            bootstrap,
        })
    }

    /// Socket address the HTTP server listens on.
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid APP_HOST {:?}", self.host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str) -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/accounts".into(),
            max_connections: 10,
            host: host.into(),
            port: 9000,
            bootstrap: None,
        }
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        let addr = config("127.0.0.1").bind_addr().unwrap();
        assert_eq!(addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn bind_addr_rejects_bad_host() {
        let err = config("not a host").bind_addr().unwrap_err();
        assert!(err.to_string().contains("APP_HOST"));
    }
}
