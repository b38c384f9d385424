//! Proxy detection (SPEC_FULL §4.4): explicit config > platform detection > environment
//! variables > direct connection. Resolution is cached for the life of the process.

use once_cell::sync::OnceCell;
use url::Url;

/// A resolved proxy decision for a given target URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyDecision {
    Direct,
    Use(String),
}

#[derive(Debug, Clone, Default)]
struct EnvProxyConfig {
    http_proxy: Option<String>,
    https_proxy: Option<String>,
    no_proxy: Option<String>,
}

/// Platform detection result, cached for the process lifetime since it only changes with the
/// OS's own proxy settings (SPEC_FULL §4.4: "Result is cached").
fn platform_proxy_config_cached() -> &'static EnvProxyConfig {
    static CONFIG: OnceCell<EnvProxyConfig> = OnceCell::new();
    CONFIG.get_or_init(platform_proxy_config)
}

/// Environment-variable overlay, read fresh each call (cheap) rather than cached, so tests that
/// mutate `std::env` in-process observe the change.
fn env_var_config() -> EnvProxyConfig {
    let mut cfg = EnvProxyConfig::default();
    if let Ok(val) = std::env::var("HTTP_PROXY").or_else(|_| std::env::var("http_proxy")) {
        cfg.http_proxy = Some(val);
    }
    if let Ok(val) = std::env::var("HTTPS_PROXY").or_else(|_| std::env::var("https_proxy")) {
        cfg.https_proxy = Some(val);
    }
    if let Ok(val) = std::env::var("NO_PROXY").or_else(|_| std::env::var("no_proxy")) {
        cfg.no_proxy = Some(val);
    }
    cfg
}

#[cfg(windows)]
fn platform_proxy_config() -> EnvProxyConfig {
    use winreg::enums::HKEY_CURRENT_USER;
    use winreg::RegKey;

    let mut cfg = EnvProxyConfig::default();
    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let Ok(settings) = hkcu.open_subkey("Software\\Microsoft\\Windows\\CurrentVersion\\Internet Settings") else {
        return cfg;
    };

    let enabled: u32 = settings.get_value("ProxyEnable").unwrap_or(0);
    if enabled == 0 {
        return cfg;
    }
    let Ok(server) = settings.get_value::<String, _>("ProxyServer") else {
        return cfg;
    };
    // ProxyServer is either a single "host:port" used for all schemes, or
    // "http=host:port;https=host:port" per-scheme form.
    if server.contains('=') {
        for part in server.split(';') {
            if let Some((scheme, addr)) = part.split_once('=') {
                match scheme {
                    "http" => cfg.http_proxy = Some(format!("http://{addr}")),
                    "https" => cfg.https_proxy = Some(format!("http://{addr}")),
                    _ => {}
                }
            }
        }
    } else {
        cfg.http_proxy = Some(format!("http://{server}"));
        cfg.https_proxy = Some(format!("http://{server}"));
    }

    if let Ok(bypass) = settings.get_value::<String, _>("ProxyOverride") {
        cfg.no_proxy = Some(bypass.replace(';', ","));
    }
    cfg
}

#[cfg(not(windows))]
fn platform_proxy_config() -> EnvProxyConfig {
    EnvProxyConfig::default()
}

/// Decide whether `target` should be proxied. Precedence (SPEC_FULL §4.4): (1) `explicit_proxy`
/// always wins; (2) platform detection, only consulted when `system_proxy_enabled`; (3)
/// environment variables, consulted unconditionally; (4) direct.
pub fn resolve(target: &Url, explicit_proxy: Option<&str>, system_proxy_enabled: bool) -> ProxyDecision {
    if let Some(p) = explicit_proxy {
        return ProxyDecision::Use(p.to_string());
    }

    let platform = if system_proxy_enabled { platform_proxy_config_cached().clone() } else { EnvProxyConfig::default() };
    let env = env_var_config();
    let host = target.host_str().unwrap_or("");

    let no_proxy = platform.no_proxy.as_deref().or(env.no_proxy.as_deref());
    if let Some(no_proxy) = no_proxy {
        if bypasses(no_proxy, host) {
            return ProxyDecision::Direct;
        }
    }

    let candidate = if target.scheme() == "https" {
        platform.https_proxy.as_deref().or(env.https_proxy.as_deref()).or(platform.http_proxy.as_deref()).or(env.http_proxy.as_deref())
    } else {
        platform.http_proxy.as_deref().or(env.http_proxy.as_deref())
    };

    match candidate {
        Some(p) => ProxyDecision::Use(p.to_string()),
        None => ProxyDecision::Direct,
    }
}

/// `no_proxy` entries are comma-separated host suffixes (optionally `*`-prefixed) or the
/// literal `*` to bypass the proxy for everything.
fn bypasses(no_proxy: &str, host: &str) -> bool {
    for entry in no_proxy.split(',') {
        let entry = entry.trim().trim_start_matches('*');
        if entry.is_empty() {
            continue;
        }
        if entry == "*" || host == entry || host.ends_with(entry) {
            return true;
        }
    }
    false
}
