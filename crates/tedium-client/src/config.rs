//! Session configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;
use crate::instrumentation::SanitizationConfig;

/// SQL Server login credentials.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Login password.
    pub password: String,
}

impl Credentials {
    /// SQL Server authentication with a login and password.
    pub fn sql_server(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// TDS protocol version requested from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TdsVersion {
    /// TDS 7.1 (SQL Server 2000).
    V7_1,
    /// TDS 7.2 (SQL Server 2005).
    V7_2,
    /// TDS 7.3.A (SQL Server 2008).
    V7_3A,
    /// TDS 7.3.B (SQL Server 2008 R2).
    V7_3B,
    /// TDS 7.4 (SQL Server 2012 and later).
    #[default]
    V7_4,
}

impl FromStr for TdsVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "7_1" => Ok(Self::V7_1),
            "7_2" => Ok(Self::V7_2),
            "7_3_A" => Ok(Self::V7_3A),
            "7_3_B" => Ok(Self::V7_3B),
            "7_4" => Ok(Self::V7_4),
            _ => Err(Error::Config(format!("invalid tds_version: {s}"))),
        }
    }
}

/// Declared workload of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplicationIntent {
    /// Read-write workload (the server default).
    #[default]
    ReadWrite,
    /// Read-only workload, eligible for readable secondaries.
    ReadOnly,
}

impl FromStr for ApplicationIntent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("readonly") {
            Ok(Self::ReadOnly)
        } else if s.eq_ignore_ascii_case("readwrite") {
            Ok(Self::ReadWrite)
        } else {
            Err(Error::Config(format!("invalid applicationintent: {s}")))
        }
    }
}

/// Configuration handed to the [`Connector`](crate::Connector) when a session
/// is established, plus the session-level behavior switches.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname or IP address.
    pub host: String,

    /// Server port (default: 1433).
    pub port: u16,

    /// Instance name (for named instances).
    pub instance: Option<String>,

    /// Database name.
    pub database: Option<String>,

    /// Authentication credentials.
    pub credentials: Credentials,

    /// Requested TDS version.
    pub tds_version: TdsVersion,

    /// Application intent.
    pub application_intent: ApplicationIntent,

    /// Whether to attempt all IPs of a multi-subnet listener in parallel.
    pub multi_subnet_failover: bool,

    /// Application name (shown in SQL Server management tools).
    pub application_name: String,

    /// Upper bound on establishing one session.
    pub connect_timeout: Duration,

    /// Whether the server aborts an open transaction when a statement fails.
    ///
    /// When this is `false`, a transaction scope that fails with a request
    /// error is not rolled back by [`Session::using_transaction`](crate::Session::using_transaction).
    pub abort_transaction_on_error: bool,

    /// How statements are recorded in tracing spans.
    pub sanitization: SanitizationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1433,
            instance: None,
            database: None,
            credentials: Credentials::default(),
            tds_version: TdsVersion::default(),
            application_intent: ApplicationIntent::default(),
            multi_subnet_failover: false,
            application_name: "tedium".to_string(),
            connect_timeout: Duration::from_secs(15),
            abort_transaction_on_error: false,
            sanitization: SanitizationConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a connection string into configuration.
    ///
    /// Recognizes `server`, `port`, `database`, `uid`, `pwd`, `tds_version`,
    /// `applicationintent`, `multisubnetfailover` and `driver` (ignored).
    /// Keys are case-insensitive; any other key is an error.
    ///
    /// ```text
    /// server=db01,1434;database=sales;uid=app;pwd=secret;applicationintent=readonly
    /// ```
    pub fn from_connection_string(conn_str: &str) -> Result<Self, Error> {
        let mut config = Self::default();

        for part in conn_str.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("invalid key-value: {part}")))?;

            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "server" => {
                    // host,port or host\instance
                    if let Some((host, port)) = value.split_once(',') {
                        config.host = host.trim().to_string();
                        config.port = parse_port(port.trim())?;
                    } else if let Some((host, instance)) = value.split_once('\\') {
                        config.host = host.to_string();
                        config.instance = Some(instance.to_string());
                    } else {
                        config.host = value.to_string();
                    }
                }
                "port" => {
                    config.port = parse_port(value)?;
                }
                "database" => {
                    config.database = Some(value.to_string());
                }
                "uid" => {
                    config.credentials.username = value.to_string();
                }
                "pwd" => {
                    config.credentials.password = value.to_string();
                }
                "tds_version" => {
                    config.tds_version = value.parse()?;
                }
                "applicationintent" => {
                    config.application_intent = value.parse()?;
                }
                "multisubnetfailover" => {
                    config.multi_subnet_failover = parse_bool(&key, value)?;
                }
                "driver" => {
                    tracing::trace!(driver = value, "ignoring driver option");
                }
                _ => {
                    return Err(Error::Config(format!(
                        "unrecognized connection string option: {key}"
                    )));
                }
            }
        }

        Ok(config)
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the application name.
    #[must_use]
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set whether the server aborts transactions on statement errors.
    #[must_use]
    pub fn abort_transaction_on_error(mut self, enabled: bool) -> Self {
        self.abort_transaction_on_error = enabled;
        self
    }

    /// Set how statements are recorded in tracing spans.
    #[must_use]
    pub fn sanitization(mut self, sanitization: SanitizationConfig) -> Self {
        self.sanitization = sanitization;
        self
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_connection_string(s)
    }
}

fn parse_port(value: &str) -> Result<u16, Error> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("invalid port: {value}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Error> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(Error::Config(format!("invalid {key}: {value}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_string_parsing() {
        let config = Config::from_connection_string(
            "Server=localhost;Database=test;UID=sa;PWD=secret;Driver={ODBC Driver 18};",
        )
        .unwrap();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.database, Some("test".to_string()));
        assert_eq!(config.credentials, Credentials::sql_server("sa", "secret"));
    }

    #[test]
    fn test_connection_string_with_port() {
        let config = Config::from_connection_string("server=db01, 1434;database=test").unwrap();

        assert_eq!(config.host, "db01");
        assert_eq!(config.port, 1434);

        let config = Config::from_connection_string("server=db01;port=2000").unwrap();
        assert_eq!(config.port, 2000);
    }

    #[test]
    fn test_connection_string_with_instance() {
        let config =
            Config::from_connection_string("Server=localhost\\SQLEXPRESS;Database=test;").unwrap();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.instance, Some("SQLEXPRESS".to_string()));
    }

    #[test]
    fn test_connection_string_enumerated_options() {
        let config = Config::from_connection_string(
            "server=ag;tds_version=7_3_B;applicationintent=ReadOnly;multisubnetfailover=TRUE",
        )
        .unwrap();

        assert_eq!(config.tds_version, TdsVersion::V7_3B);
        assert_eq!(config.application_intent, ApplicationIntent::ReadOnly);
        assert!(config.multi_subnet_failover);
    }

    #[test]
    fn test_connection_string_rejects_unknown_option() {
        let err = Config::from_connection_string("server=x;encrypt=true").unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("encrypt")));
    }

    #[test]
    fn test_connection_string_rejects_bad_values() {
        assert!(Config::from_connection_string("server=x;port=http").is_err());
        assert!(Config::from_connection_string("applicationintent=sometimes").is_err());
        assert!(Config::from_connection_string("multisubnetfailover=yes").is_err());
        assert!(Config::from_connection_string("tds_version=8_0").is_err());
        assert!(Config::from_connection_string("server").is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let rendered = format!("{:?}", Credentials::sql_server("app", "hunter2"));
        assert!(rendered.contains("app"));
        assert!(!rendered.contains("hunter2"));
    }
}
