use std::{env, str::FromStr};

/// Ten years; longer lifetimes run past the representable date range.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365 * 10;

/// Who may read and write which rows of the CRUD resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Rows are scoped to their owners (and swap participants).
    Owner,
    /// Every authenticated caller can touch every row.
    Open,
}

impl FromStr for AccessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "open" => Ok(Self::Open),
            other => Err(format!("unknown access policy '{other}'")),
        }
    }
}

/// Whether swap request status changes must follow the transition graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionPolicy {
    Strict,
    Free,
}

impl FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "free" => Ok(Self::Free),
            other => Err(format!("unknown transition policy '{other}'")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub session_ttl_hours: i64,
    pub access_policy: AccessPolicy,
    pub status_transitions: TransitionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: "sqlite:./data/skillswap.db?mode=rwc".to_string(),
            session_ttl_hours: 24 * 14,
            access_policy: AccessPolicy::Owner,
            status_transitions: TransitionPolicy::Strict,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .ok()
                .and_then(|raw| parse_session_ttl(&raw))
                .unwrap_or(defaults.session_ttl_hours),
            access_policy: parse_or_default("ACCESS_POLICY", defaults.access_policy),
            status_transitions: parse_or_default("STATUS_TRANSITIONS", defaults.status_transitions),
        }
    }
}

fn parse_session_ttl(raw: &str) -> Option<i64> {
    let hours = raw.trim().parse::<i64>().ok()?;
    if (1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
        Some(hours)
    } else {
        tracing::warn!(
            "SESSION_TTL_HOURS: {hours} is outside 1..={MAX_SESSION_TTL_HOURS}, using the default"
        );
        None
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr<Err = String> + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            tracing::warn!("{key}: {e}, falling back to {default:?}");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_parse_case_insensitively() {
        assert_eq!("OWNER".parse::<AccessPolicy>(), Ok(AccessPolicy::Owner));
        assert_eq!(" open ".parse::<AccessPolicy>(), Ok(AccessPolicy::Open));
        assert_eq!("Free".parse::<TransitionPolicy>(), Ok(TransitionPolicy::Free));
        assert!("sometimes".parse::<TransitionPolicy>().is_err());
    }

    #[test]
    fn session_ttl_must_be_positive_and_bounded() {
        assert_eq!(parse_session_ttl("48"), Some(48));
        assert_eq!(parse_session_ttl(" 1 "), Some(1));
        assert_eq!(parse_session_ttl("0"), None);
        assert_eq!(parse_session_ttl("-5"), None);
        assert_eq!(parse_session_ttl("2400000000"), None);
        assert_eq!(parse_session_ttl("soon"), None);
        assert_eq!(
            parse_session_ttl(&MAX_SESSION_TTL_HOURS.to_string()),
            Some(MAX_SESSION_TTL_HOURS)
        );
    }

    #[test]
    fn defaults_scope_rows_and_enforce_transitions() {
        let config = Config::default();
        assert_eq!(config.access_policy, AccessPolicy::Owner);
        assert_eq!(config.status_transitions, TransitionPolicy::Strict);
        assert_eq!(config.session_ttl_hours, 336);
    }
}
