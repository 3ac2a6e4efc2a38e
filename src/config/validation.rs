use crate::churn::SwarmDescriptor;
use crate::config::types::Config;
use url::Url;

/// Checks a configuration for entries that will not produce traffic
///
/// Nothing here is fatal: a run proceeds with whatever the document holds.
/// The returned messages are meant to be logged as warnings at startup.
pub fn validate(config: &Config) -> Vec<String> {
    let mut warnings = Vec::new();
    validate_urls(&config.urls, &mut warnings);
    validate_identities(config, &mut warnings);
    validate_cadence(config, &mut warnings);
    validate_churn(config, &mut warnings);
    warnings
}

/// Validates frontier seed URLs
fn validate_urls(urls: &[String], warnings: &mut Vec<String>) {
    for url in urls {
        match Url::parse(url) {
            Ok(parsed) => {
                if !matches!(parsed.scheme(), "http" | "https") {
                    warnings.push(format!(
                        "Seed URL '{}' uses scheme '{}', HTTP probes will fail",
                        url,
                        parsed.scheme()
                    ));
                }
            }
            Err(e) => warnings.push(format!("Seed URL '{}' does not parse: {}", url, e)),
        }
    }
}

/// Validates the identity list
fn validate_identities(config: &Config, warnings: &mut Vec<String>) {
    if config.user_agents.is_empty() && !config.urls.is_empty() {
        warnings.push("No user_agents configured, sweeps will issue no probes".to_string());
    }

    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        warnings.push("user_agents contains an empty identity".to_string());
    }
}

/// Validates sweep cadence
fn validate_cadence(config: &Config, warnings: &mut Vec<String>) {
    if config.rate_limit == Some(0) {
        warnings.push("rate_limit is 0, sweeps will run back to back".to_string());
    }
}

/// Validates the churn settings
fn validate_churn(config: &Config, warnings: &mut Vec<String>) {
    match (&config.torrent_link, config.churn_attempts()) {
        (Some(link), _) => {
            if let Err(e) = SwarmDescriptor::parse(link) {
                warnings.push(format!("torrent_link is unusable: {}", e));
            }
        }
        (None, attempts) if attempts > 0 => {
            warnings.push(format!(
                "max_retries is {} but no torrent_link is set, churn is disabled",
                attempts
            ));
        }
        (None, _) => {}
    }

    for node in config.dht_bootstrap.iter().flatten() {
        let has_port = node
            .rsplit_once(':')
            .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
            .unwrap_or(false);
        if !has_port {
            warnings.push(format!("DHT bootstrap node '{}' is not host:port", node));
        }
    }
}
