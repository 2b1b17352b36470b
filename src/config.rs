use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{bail, Context};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenType {
    /// TCP on `bind_ip:port`.
    Port,
    /// Unix domain socket at `socket_path`.
    Sock,
}

impl FromStr for ListenType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "port" => Ok(Self::Port),
            "sock" => Ok(Self::Sock),
            other => bail!("unknown listen type {other:?}, expected \"port\" or \"sock\""),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListenConfig {
    pub kind: ListenType,
    pub bind_ip: String,
    pub port: u16,
    pub socket_path: PathBuf,
}

#[derive(Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub collection: String,
    pub timeout: Duration,
}

impl fmt::Debug for MongoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub is_debug: bool,
    pub listen: ListenConfig,
    pub mongodb: MongoConfig,
    pub request_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any variable source; missing variables take their defaults.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let listen = ListenConfig {
            kind: or("APP_LISTEN_TYPE", "port").parse()?,
            bind_ip: or("APP_HOST", "127.0.0.1"),
            port: parse(&var, "APP_PORT", 8080)?,
            socket_path: var("APP_SOCKET_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_socket_path),
        };

        let mongodb = MongoConfig {
            uri: var("MONGODB_URI").context("MONGODB_URI must be set")?,
            username: or("MONGODB_USERNAME", ""),
            password: or("MONGODB_PASSWORD", ""),
            database: or("MONGODB_DATABASE", "feedback"),
            collection: or("MONGODB_COLLECTION", "users"),
            timeout: Duration::from_secs(parse(&var, "MONGODB_TIMEOUT_SECS", 10)?),
        };

        Ok(Self {
            is_debug: parse(&var, "IS_DEBUG", true)?,
            listen,
            mongodb,
            request_timeout: Duration::from_secs(parse(&var, "APP_REQUEST_TIMEOUT_SECS", 15)?),
        })
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value {raw:?} for {key}")),
        None => Ok(default),
    }
}

/// `app.sock` next to the running executable.
fn default_socket_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("app.sock")))
        .unwrap_or_else(|| PathBuf::from("app.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = load(&[("MONGODB_URI", "cluster0.example.net")]).unwrap();
        assert!(cfg.is_debug);
        assert_eq!(cfg.listen.kind, ListenType::Port);
        assert_eq!(cfg.listen.bind_ip, "127.0.0.1");
        assert_eq!(cfg.listen.port, 8080);
        assert!(cfg.listen.socket_path.ends_with("app.sock"));
        assert_eq!(cfg.mongodb.database, "feedback");
        assert_eq!(cfg.mongodb.collection, "users");
        assert!(cfg.mongodb.username.is_empty());
        assert_eq!(cfg.mongodb.timeout, Duration::from_secs(10));
        assert_eq!(cfg.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn overrides_are_read() {
        let cfg = load(&[
            ("MONGODB_URI", "mongodb://localhost:27017"),
            ("MONGODB_USERNAME", "svc"),
            ("MONGODB_PASSWORD", "s3cret"),
            ("MONGODB_COLLECTION", "people"),
            ("APP_LISTEN_TYPE", "sock"),
            ("APP_SOCKET_PATH", "/tmp/users.sock"),
            ("APP_PORT", "9090"),
            ("IS_DEBUG", "false"),
        ])
        .unwrap();
        assert!(!cfg.is_debug);
        assert_eq!(cfg.listen.kind, ListenType::Sock);
        assert_eq!(cfg.listen.socket_path, PathBuf::from("/tmp/users.sock"));
        assert_eq!(cfg.listen.port, 9090);
        assert_eq!(cfg.mongodb.username, "svc");
        assert_eq!(cfg.mongodb.collection, "people");
    }

    #[test]
    fn missing_uri_is_an_error() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("MONGODB_URI"));
    }

    #[test]
    fn bad_values_are_errors() {
        let base = ("MONGODB_URI", "localhost");
        assert!(load(&[base, ("APP_LISTEN_TYPE", "pipe")]).is_err());
        assert!(load(&[base, ("APP_PORT", "http")]).is_err());
        assert!(load(&[base, ("IS_DEBUG", "maybe")]).is_err());
    }

    #[test]
    fn debug_output_hides_password() {
        let cfg = load(&[("MONGODB_URI", "localhost"), ("MONGODB_PASSWORD", "s3cret")]).unwrap();
        assert!(!format!("{cfg:?}").contains("s3cret"));
    }
}
