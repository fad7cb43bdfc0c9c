//! Configuration for the Click-to-Call microservice

use anyhow::{bail, Context};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use pbx_ami::{SessionOptions, DEFAULT_AMI_PORT};

/// Manager interface connection settings
#[derive(Clone)]
pub struct AmiConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub secret: String,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
}

impl AmiConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::default()
            .with_connect_timeout(self.connect_timeout)
            .with_response_timeout(self.response_timeout)
    }
}

impl fmt::Debug for AmiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmiConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .field("response_timeout", &self.response_timeout)
            .finish()
    }
}

/// Dialplan parameters applied to every Originate
#[derive(Debug, Clone)]
pub struct DialPlan {
    /// Caller ID shown on the extension; `%s` is replaced by the number
    pub caller_id_template: String,
    /// Dialplan context the destination is dialed in
    pub context: String,
    /// Seconds to wait for the extension to answer
    pub wait_time: u32,
    /// Dialplan priority
    pub priority: u32,
}

impl DialPlan {
    pub fn caller_id(&self, number: &str) -> String {
        self.caller_id_template.replacen("%s", number, 1)
    }
}

impl Default for DialPlan {
    fn default() -> Self {
        Self {
            caller_id_template: "CTR Plugin (%s)".to_string(),
            context: "from-internal".to_string(),
            wait_time: 30,
            priority: 1,
        }
    }
}

/// Click-to-Call configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address
    pub host: String,
    /// HTTP port
    pub port: u16,
    /// Manager interface
    pub ami: AmiConfig,
    /// Originate parameters
    pub dial: DialPlan,
    /// Extra attempts for connect/login/lookup
    pub max_retry: u32,
    /// First backoff interval between attempts
    pub retry_interval: Duration,
    /// Client address patterns allowed to place calls
    pub allowed_ips: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_source<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let millis = |key: &str, default: &str| -> anyhow::Result<Duration> {
            let ms: u64 = var(key, default)
                .parse()
                .with_context(|| format!("Invalid {}", key))?;
            Ok(Duration::from_millis(ms))
        };

        let config = Self {
            host: var("HOST", "0.0.0.0"),
            port: var("PORT", "8096").parse().context("Invalid PORT")?,
            ami: AmiConfig {
                host: var("AMI_HOST", "127.0.0.1"),
                port: var("AMI_PORT", &DEFAULT_AMI_PORT.to_string())
                    .parse()
                    .context("Invalid AMI_PORT")?,
                username: var("AMI_USERNAME", "admin"),
                secret: var("AMI_SECRET", ""),
                connect_timeout: millis("AMI_CONNECT_TIMEOUT_MS", "5000")?,
                response_timeout: millis("AMI_RESPONSE_TIMEOUT_MS", "5000")?,
            },
            dial: DialPlan {
                caller_id_template: var("CALLER_ID_TEMPLATE", "CTR Plugin (%s)"),
                context: var("DIAL_CONTEXT", "from-internal"),
                wait_time: var("WAIT_TIME", "30").parse().context("Invalid WAIT_TIME")?,
                priority: var("DIAL_PRIORITY", "1")
                    .parse()
                    .context("Invalid DIAL_PRIORITY")?,
            },
            max_retry: var("MAX_RETRY", "2").parse().context("Invalid MAX_RETRY")?,
            retry_interval: millis("RETRY_INTERVAL_MS", "200")?,
            allowed_ips: parse_pattern_list(&var("ALLOWED_IPS", "127.0.0.1,::1"))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Values that end up on manager protocol lines must be single-line
    fn validate(&self) -> anyhow::Result<()> {
        let single_line = [
            ("AMI_USERNAME", &self.ami.username),
            ("AMI_SECRET", &self.ami.secret),
            ("CALLER_ID_TEMPLATE", &self.dial.caller_id_template),
            ("DIAL_CONTEXT", &self.dial.context),
        ];
        for (key, value) in single_line {
            if value.contains(['\r', '\n', '\0']) {
                bail!("{} must not contain line breaks", key);
            }
        }
        if self.dial.context.trim().is_empty() {
            bail!("DIAL_CONTEXT must not be empty");
        }
        Ok(())
    }

    /// Get socket address for binding
    pub fn bind_address(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }
}

/// A JSON array of strings, or a comma-separated list
fn parse_pattern_list(raw: &str) -> anyhow::Result<Vec<String>> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        return serde_json::from_str(raw).context("Invalid ALLOWED_IPS JSON array");
    }

    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_source(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.ami.host, "127.0.0.1");
        assert_eq!(config.ami.port, 5038);
        assert_eq!(config.dial.context, "from-internal");
        assert_eq!(config.dial.wait_time, 30);
        assert_eq!(config.dial.priority, 1);
        assert_eq!(config.max_retry, 2);
        assert_eq!(config.allowed_ips, vec!["127.0.0.1", "::1"]);
        assert_eq!(config.bind_address().unwrap().port(), 8096);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("AMI_HOST", "pbx.internal"),
            ("AMI_PORT", "15038"),
            ("AMI_SECRET", "s3cret"),
            ("WAIT_TIME", "45"),
            ("AMI_RESPONSE_TIMEOUT_MS", "750"),
            ("ALLOWED_IPS", "172.31.0.0/16, 2001:db8::/32 ,,::1"),
        ])
        .unwrap();

        assert_eq!(config.ami.host, "pbx.internal");
        assert_eq!(config.ami.port, 15038);
        assert_eq!(config.dial.wait_time, 45);
        assert_eq!(config.ami.response_timeout, Duration::from_millis(750));
        assert_eq!(config.allowed_ips, vec!["172.31.0.0/16", "2001:db8::/32", "::1"]);
    }

    #[test]
    fn test_allowed_ips_json() {
        let config = load(&[("ALLOWED_IPS", r#"["10.0.0.0/8", "192.168.*"]"#)]).unwrap();
        assert_eq!(config.allowed_ips, vec!["10.0.0.0/8", "192.168.*"]);
        assert!(load(&[("ALLOWED_IPS", "[not json")]).is_err());
    }

    #[test]
    fn test_rejects_bad_numbers() {
        assert!(load(&[("AMI_PORT", "70000")]).is_err());
        assert!(load(&[("MAX_RETRY", "-1")]).is_err());
        assert!(load(&[("RETRY_INTERVAL_MS", "soon")]).is_err());
    }

    #[test]
    fn test_rejects_multiline_protocol_values() {
        assert!(load(&[("DIAL_CONTEXT", "from-internal\r\nAction: Logoff")]).is_err());
        assert!(load(&[("CALLER_ID_TEMPLATE", "x\ny")]).is_err());
    }

    #[test]
    fn test_caller_id_template() {
        let dial = DialPlan::default();
        assert_eq!(dial.caller_id("+15551234567"), "CTR Plugin (+15551234567)");

        let fixed = DialPlan {
            caller_id_template: "Reception".to_string(),
            ..DialPlan::default()
        };
        assert_eq!(fixed.caller_id("123"), "Reception");
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = load(&[("AMI_SECRET", "hunter2")]).unwrap();
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
