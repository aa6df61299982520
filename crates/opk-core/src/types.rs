//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::time::format_hm;

/// Default logical identity name
pub const DEFAULT_NAME: &str = "id_opkssh";

/// Default age after which an identity is renewed
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(23 * 60 * 60);

/// Validity window of certificates issued by opkssh
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

/// Default bound on the interactive login flow
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default status polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Age of an identity on disk
///
/// A missing private key is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityAge {
    /// Private key exists and was last modified this long ago
    Present(Duration),
    /// No private key file
    Missing,
}

impl IdentityAge {
    /// Age if the identity exists
    pub fn duration(&self) -> Option<Duration> {
        match self {
            IdentityAge::Present(age) => Some(*age),
            IdentityAge::Missing => None,
        }
    }

    /// Check whether the identity is missing
    pub fn is_missing(&self) -> bool {
        matches!(self, IdentityAge::Missing)
    }
}

impl fmt::Display for IdentityAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityAge::Present(age) => write!(f, "{}", format_hm(*age)),
            IdentityAge::Missing => write!(f, "missing"),
        }
    }
}

/// When to renew an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalPolicy {
    /// Age at which renewal becomes due
    pub max_age: Duration,
    /// Renew regardless of age
    pub force: bool,
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            force: false,
        }
    }
}

impl RenewalPolicy {
    /// Whether an identity of this age needs the full renewal path
    pub fn requires_renewal(&self, age: IdentityAge) -> bool {
        match age {
            IdentityAge::Missing => true,
            IdentityAge::Present(age) => self.force || age >= self.max_age,
        }
    }
}

/// Options for registering an identity with the agent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Requested agent-side lifetime; None or zero means no limit
    pub lifetime: Option<Duration>,
    /// Ask the agent to confirm every use
    pub confirm: bool,
    /// Entry comment; defaults to the key's own comment or its path
    pub comment: Option<String>,
}

impl AddOptions {
    /// Options with a lifetime limit
    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            lifetime: Some(lifetime),
            ..Default::default()
        }
    }
}

/// User-facing identity status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStatus {
    /// No identity on disk
    Missing,
    /// Older than the certificate validity
    Expired,
    /// Past the renewal age but still valid
    NearExpiry {
        #[serde(with = "crate::config::serde_utils::duration_secs")]
        remaining: Duration,
    },
    /// Valid with no action required
    Valid {
        #[serde(with = "crate::config::serde_utils::duration_secs")]
        remaining: Duration,
    },
}

impl IdentityStatus {
    /// Classify an identity age against the renewal age and the validity window
    pub fn classify(age: IdentityAge, max_age: Duration, validity: Duration) -> Self {
        let age = match age {
            IdentityAge::Missing => return IdentityStatus::Missing,
            IdentityAge::Present(age) => age,
        };

        if age > validity {
            return IdentityStatus::Expired;
        }

        let remaining = validity - age;
        if age > max_age {
            IdentityStatus::NearExpiry { remaining }
        } else {
            IdentityStatus::Valid { remaining }
        }
    }

    /// Short status line
    pub fn summary(&self) -> String {
        match self {
            IdentityStatus::Missing => "Identity Missing".to_string(),
            IdentityStatus::Expired => "Identity Expired".to_string(),
            IdentityStatus::NearExpiry { remaining } | IdentityStatus::Valid { remaining } => {
                format!("Identity has {} left", format_hm(*remaining))
            }
        }
    }

    /// Longer explanation of the status
    pub fn description(&self) -> &'static str {
        match self {
            IdentityStatus::Missing => "No identity found",
            IdentityStatus::Expired => "Identity has expired",
            IdentityStatus::NearExpiry { .. } => "Identity is close to expiry",
            IdentityStatus::Valid { .. } => "Identity valid, no action required",
        }
    }

    /// Whether the user should renew now
    pub fn renewal_due(&self) -> bool {
        !matches!(self, IdentityStatus::Valid { .. })
    }
}

impl fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_policy_fresh_identity() {
        let policy = RenewalPolicy::default();
        assert!(!policy.requires_renewal(IdentityAge::Present(HOUR)));
    }

    #[test]
    fn test_policy_stale_identity() {
        let policy = RenewalPolicy::default();
        assert!(policy.requires_renewal(IdentityAge::Present(23 * HOUR)));
        assert!(policy.requires_renewal(IdentityAge::Present(30 * HOUR)));
    }

    #[test]
    fn test_policy_force_and_missing() {
        let forced = RenewalPolicy {
            force: true,
            ..Default::default()
        };
        assert!(forced.requires_renewal(IdentityAge::Present(Duration::ZERO)));
        assert!(RenewalPolicy::default().requires_renewal(IdentityAge::Missing));
    }

    #[test]
    fn test_classify_missing() {
        let status = IdentityStatus::classify(IdentityAge::Missing, DEFAULT_MAX_AGE, DEFAULT_VALIDITY);
        assert_eq!(status, IdentityStatus::Missing);
        assert_eq!(status.summary(), "Identity Missing");
        assert_eq!(status.description(), "No identity found");
        assert!(status.renewal_due());
    }

    #[test]
    fn test_classify_valid() {
        let age = IdentityAge::Present(HOUR + Duration::from_secs(5 * 60));
        let status = IdentityStatus::classify(age, DEFAULT_MAX_AGE, DEFAULT_VALIDITY);
        assert_eq!(
            status,
            IdentityStatus::Valid {
                remaining: 22 * HOUR + Duration::from_secs(55 * 60)
            }
        );
        assert_eq!(status.summary(), "Identity has 22h55m left");
        assert!(!status.renewal_due());
    }

    #[test]
    fn test_classify_near_expiry() {
        let age = IdentityAge::Present(23 * HOUR + Duration::from_secs(30 * 60));
        let status = IdentityStatus::classify(age, DEFAULT_MAX_AGE, DEFAULT_VALIDITY);
        assert!(matches!(status, IdentityStatus::NearExpiry { .. }));
        assert_eq!(status.summary(), "Identity has 00h30m left");
        assert_eq!(status.description(), "Identity is close to expiry");
        assert!(status.renewal_due());
    }

    #[test]
    fn test_classify_expired() {
        let age = IdentityAge::Present(25 * HOUR);
        let status = IdentityStatus::classify(age, DEFAULT_MAX_AGE, DEFAULT_VALIDITY);
        assert_eq!(status, IdentityStatus::Expired);
        assert_eq!(status.summary(), "Identity Expired");
    }

    #[test]
    fn test_status_json() {
        let status = IdentityStatus::Valid {
            remaining: Duration::from_secs(120),
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"valid":{"remaining":120}}"#);

        let missing = serde_json::to_string(&IdentityStatus::Missing).unwrap();
        assert_eq!(missing, r#""missing""#);
    }

    #[test]
    fn test_age_display() {
        assert_eq!(IdentityAge::Missing.to_string(), "missing");
        assert_eq!(IdentityAge::Present(2 * HOUR).to_string(), "02h00m");
    }
}
