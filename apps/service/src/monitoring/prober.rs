use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::types::STATUS_UNREACHABLE;

/// Default per-probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Issues single GET probes against target URLs.
///
/// Redirects are not followed: a redirect response's own status code is
/// the recorded result.
pub struct Prober {
    client: reqwest::Client,
}

impl Prober {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    /// Probe one URL.
    ///
    /// Infallible: transport-level failures are reported as
    /// [`STATUS_UNREACHABLE`], so every call yields exactly one
    /// observation.
    pub async fn probe(&self, url: &str) -> (u16, DateTime<Utc>) {
        let status_code = match self.client.get(url).send().await {
            Ok(response) => response.status().as_u16(),
            Err(error) => {
                debug!(%url, %error, "probe transport failure");
                STATUS_UNREACHABLE
            }
        };

        (status_code, Utc::now())
    }
}
