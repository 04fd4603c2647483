use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bitrix24 REST endpoint configuration.
///
/// The webhook URL embeds the tenant and an inbound-webhook token, so the
/// whole base is treated as a secret and read from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitrixConfig {
    /// Webhook base, e.g. `https://example.bitrix24.com/rest/17/<token>`.
    pub base_url: String,
    /// Only remote contacts created on/after this date are pulled.
    pub created_since: NaiveDate,
    /// Outbound call timeout for both the list and add endpoints.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl BitrixConfig {
    pub const ENV_BASE_URL: &'static str = "BRIDGE24_BITRIX_URL";

    /// Read the endpoint from `BRIDGE24_BITRIX_URL`; filter date and timeout
    /// keep their fixed defaults (2019-01-01, 30s).
    pub fn from_env() -> crate::Result<Self> {
        let base_url = std::env::var(Self::ENV_BASE_URL).map_err(|_| {
            crate::Error::InvalidInput(format!("{} is not set", Self::ENV_BASE_URL))
        })?;
        Ok(Self::new(base_url))
    }

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            created_since: default_created_since(),
            timeout: Duration::from_secs(30),
        }
    }
}

fn default_created_since() -> NaiveDate {
    // Fixed reconciliation window floor carried over from the original sync job.
    NaiveDate::from_ymd_opt(2019, 1, 1).unwrap_or_default()
}

/// How local contacts are matched by email during reconciliation.
///
/// The store's uniqueness invariant is case-insensitive either way; `Exact`
/// reproduces the legacy byte-wise lookup, under which a case-variant remote
/// email classifies as `create` and then aborts the batch on the unique
/// index.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailMatching {
    #[default]
    CaseInsensitive,
    Exact,
}

/// Reconciler knobs surfaced on the `sync` command.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SyncSettings {
    /// Classify and report without writing.
    pub dry_run: bool,
    pub matching: EmailMatching,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
