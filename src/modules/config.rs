use std::env;

const API_KEY_ENV: &str = "BUAA_PROXY_API_KEY";
const BIND_ENV: &str = "BUAA_PROXY_BIND";
const PORT_ENV: &str = "BUAA_PROXY_PORT";
const TRUSTED_TLS_HOSTS_ENV: &str = "BUAA_PROXY_TRUSTED_TLS_HOSTS";

const DEFAULT_BIND: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_TRUSTED_TLS_HOSTS: &str = "iclass.buaa.edu.cn";

/// Service configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_address: String,
    pub port: u16,
    /// Accepted keys for the generic proxy endpoint, comma-separated in the
    /// environment.
    pub api_keys: Vec<String>,
    /// Hosts for which upstream TLS certificate verification is relaxed.
    pub trusted_tls_hosts: Vec<String>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, String> {
        let raw_keys = env::var(API_KEY_ENV)
            .map_err(|_| format!("{} is not set (comma-separated API key list)", API_KEY_ENV))?;
        let api_keys = split_list(&raw_keys);
        if api_keys.is_empty() {
            return Err(format!("{} contains no usable keys", API_KEY_ENV));
        }

        let bind_address = env::var(BIND_ENV).unwrap_or_else(|_| DEFAULT_BIND.to_string());

        let port = match env::var(PORT_ENV) {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| format!("invalid {}: {}", PORT_ENV, raw))?,
            Err(_) => DEFAULT_PORT,
        };

        let trusted_tls_hosts = split_list(
            &env::var(TRUSTED_TLS_HOSTS_ENV)
                .unwrap_or_else(|_| DEFAULT_TRUSTED_TLS_HOSTS.to_string()),
        );

        Ok(Self {
            bind_address,
            port,
            api_keys,
            trusted_tls_hosts,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_list(" key-1 , key-2 "), vec!["key-1", "key-2"]);
        assert_eq!(split_list("solo"), vec!["solo"]);
    }

    #[test]
    fn test_split_list_drops_empty_entries() {
        assert_eq!(split_list("a,,b,"), vec!["a", "b"]);
        assert!(split_list("").is_empty());
        assert!(split_list(" , ,").is_empty());
    }
}
