use anyhow::{Result, anyhow};
use url::Url;

/// Validate a monitoring target URL before it is persisted.
///
/// Only absolute http/https URLs with a host are accepted; anything
/// else is rejected at the CRUD boundary instead of producing an
/// endless stream of unreachable probes.
pub fn validate_target_url(target: &str) -> Result<()> {
    let url = Url::parse(target).map_err(|error| anyhow!("invalid URL: {error}"))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("unsupported scheme for monitoring: {other}")),
    }

    if url.host_str().is_none() {
        return Err(anyhow!("target URL has no host"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https_targets() {
        assert!(validate_target_url("http://example.com/health").is_ok());
        assert!(validate_target_url("https://example.com:8443/").is_ok());
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert!(validate_target_url("ftp://example.com/").is_err());
        assert!(validate_target_url("not a url").is_err());
        assert!(validate_target_url("unix:/run/upwatch.sock").is_err());
    }
}
