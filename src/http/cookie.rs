use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use url::form_urlencoded::byte_serialize;

/// Last instant an HTTP date can carry (9999-12-31T23:59:59Z).
const LATEST_HTTP_DATE: Duration = Duration::from_secs(253_402_300_799);

/// Latest representable expiry; later instants are clamped to it.
pub(crate) fn latest_http_date() -> SystemTime {
    SystemTime::UNIX_EPOCH + LATEST_HTTP_DATE
}

/// RFC 7231 date for `at`, clamped to the year 9999.
pub(crate) fn fmt_http_date(at: SystemTime) -> String {
    httpdate::fmt_http_date(at.min(latest_http_date()))
}

/// A cookie waiting to be sent with the response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookie {
    pub value: String,
    pub expires: Option<SystemTime>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn expires(mut self, at: SystemTime) -> Self {
        self.expires = Some(at);
        self
    }

    /// Expire `lifetime` from now.
    #[must_use]
    pub fn max_age(self, lifetime: Duration) -> Self {
        let at = SystemTime::now()
            .checked_add(lifetime)
            .map_or_else(latest_http_date, |at| at.min(latest_http_date()));
        self.expires(at)
    }

    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// A cookie that tells the client to drop `name` (empty, expired a day ago).
    #[must_use]
    pub fn removal() -> Self {
        let yesterday = SystemTime::now()
            .checked_sub(Duration::from_secs(86_400))
            .unwrap_or(SystemTime::UNIX_EPOCH);
        Self::new("").expires(yesterday)
    }

    /// `Set-Cookie` value for this cookie under `name`.
    ///
    /// Name and value are form-urlencoded; empty domain/path are omitted.
    #[must_use]
    pub fn header_value(&self, name: &str) -> String {
        let mut out = format!(
            "{}={}",
            byte_serialize(name.as_bytes()).collect::<String>(),
            byte_serialize(self.value.as_bytes()).collect::<String>()
        );
        if let Some(domain) = self.domain.as_deref().filter(|d| !d.is_empty()) {
            out.push_str("; domain=");
            out.push_str(domain);
        }
        if let Some(path) = self.path.as_deref().filter(|p| !p.is_empty()) {
            out.push_str("; path=");
            out.push_str(path);
        }
        if let Some(expires) = self.expires {
            out.push_str("; expires=");
            out.push_str(&fmt_http_date(expires));
        }
        if self.secure {
            out.push_str("; secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out
    }
}

/// Defaults applied to cookies set through the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    /// Lifetime in seconds; `None` makes session cookies
    pub expires: Option<u64>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub httponly: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            expires: Some(30 * 60),
            path: Some("/".to_string()),
            domain: None,
            secure: false,
            httponly: false,
        }
    }
}

impl CookieSettings {
    /// A cookie carrying `value` with these defaults.
    #[must_use]
    pub fn cookie(&self, value: impl Into<String>) -> Cookie {
        let mut cookie = Cookie::new(value)
            .secure(self.secure)
            .http_only(self.httponly);
        if let Some(seconds) = self.expires {
            cookie = cookie.max_age(Duration::from_secs(seconds));
        }
        if let Some(path) = &self.path {
            cookie = cookie.path(path.clone());
        }
        if let Some(domain) = &self.domain {
            cookie = cookie.domain(domain.clone());
        }
        cookie
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_value_with_all_attributes() {
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(784_111_777);
        let cookie = Cookie::new("a b&c")
            .expires(at)
            .domain("example.com")
            .path("/blog")
            .secure(true)
            .http_only(true);
        assert_eq!(
            cookie.header_value("session id"),
            "session+id=a+b%26c; domain=example.com; path=/blog; \
             expires=Sun, 06 Nov 1994 08:49:37 GMT; secure; HttpOnly"
        );
    }

    #[test]
    fn test_header_value_minimal() {
        assert_eq!(Cookie::new("1").header_value("seen"), "seen=1");
    }

    #[test]
    fn test_removal_is_in_the_past() {
        let cookie = Cookie::removal();
        assert!(cookie.value.is_empty());
        assert!(cookie.expires.unwrap() < SystemTime::now());
    }

    #[test]
    fn test_far_future_expiry_is_clamped() {
        let cookie = CookieSettings {
            expires: Some(u64::MAX),
            ..CookieSettings::default()
        }
        .cookie("v");
        assert_eq!(cookie.expires, Some(latest_http_date()));
        assert!(cookie
            .header_value("k")
            .ends_with("; expires=Fri, 31 Dec 9999 23:59:59 GMT"));

        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(400_000_000_000);
        assert!(Cookie::new("v")
            .expires(at)
            .header_value("k")
            .ends_with("expires=Fri, 31 Dec 9999 23:59:59 GMT"));
    }

    #[test]
    fn test_settings_defaults() {
        let cookie = CookieSettings::default().cookie("v");
        assert_eq!(cookie.path.as_deref(), Some("/"));
        assert!(cookie.expires.unwrap() > SystemTime::now());
        assert!(!cookie.secure);
    }
}
