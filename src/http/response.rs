use std::io::{self, Write};
use std::time::SystemTime;

use http::header::{CACHE_CONTROL, EXPIRES, LOCATION, PRAGMA, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use super::cookie::{fmt_http_date, Cookie};
use super::status::reason_phrase;
use crate::error::FrameworkError;

/// `Expires` value used when caching is disabled.
const EXPIRED_DATE: &str = "Wed, 06 Aug 1991 08:00:00 GMT";

/// Caching instruction for [`Response::cache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Forbid caching anywhere along the way
    Disabled,
    /// Allow caching until the given instant
    Until(SystemTime),
}

/// How [`Response::send`] writes the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendMode {
    /// `Status: 404 Not Found`, for a CGI gateway
    Cgi,
    /// `HTTP/1.1 404 Not Found`
    Http { protocol: String },
}

impl Default for SendMode {
    fn default() -> Self {
        SendMode::Http {
            protocol: "HTTP/1.1".to_string(),
        }
    }
}

/// The response being assembled for the current request.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HeaderMap,
    body: String,
    cookies: Vec<(String, Cookie)>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HeaderMap::new(),
            body: String::new(),
            cookies: Vec::new(),
        }
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Set the status code. Only codes with a known reason phrase are accepted.
    pub fn set_status(&mut self, code: u16) -> Result<(), FrameworkError> {
        if reason_phrase(code).is_none() {
            return Err(FrameworkError::InvalidStatus { code });
        }
        self.status = code;
        Ok(())
    }

    pub fn set_status_code(&mut self, code: StatusCode) {
        self.status = code.as_u16();
    }

    #[must_use]
    pub fn reason(&self) -> &'static str {
        reason_phrase(self.status).unwrap_or("")
    }

    /// First value of the header `name`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Every value of the header `name`, in insertion order.
    #[must_use]
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Replace any existing values of `name` with `value`.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), FrameworkError> {
        let (name, value) = header_pair(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Add another value for `name`, keeping existing ones.
    pub fn append_header(&mut self, name: &str, value: &str) -> Result<(), FrameworkError> {
        let (name, value) = header_pair(name, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    /// Remove every value of `name`; returns whether anything was removed.
    pub fn remove_header(&mut self, name: &str) -> bool {
        self.headers.remove(name).is_some()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn append_body(&mut self, chunk: &str) {
        self.body.push_str(chunk);
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    /// Queue a cookie, replacing an earlier one with the same name.
    pub fn set_cookie(&mut self, name: impl Into<String>, cookie: Cookie) {
        let name = name.into();
        match self.cookies.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = cookie,
            None => self.cookies.push((name, cookie)),
        }
    }

    /// Ask the client to drop the cookie `name`.
    pub fn delete_cookie(&mut self, name: impl Into<String>) {
        self.set_cookie(name, Cookie::removal());
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    #[must_use]
    pub fn cookies(&self) -> &[(String, Cookie)] {
        &self.cookies
    }

    /// Back to an empty 200.
    pub fn clear(&mut self) {
        self.status = 200;
        self.headers.clear();
        self.cookies.clear();
        self.body.clear();
    }

    pub fn cache(&mut self, policy: CachePolicy) {
        match policy {
            CachePolicy::Disabled => {
                self.headers
                    .insert(EXPIRES, HeaderValue::from_static(EXPIRED_DATE));
                self.headers.insert(
                    CACHE_CONTROL,
                    HeaderValue::from_static("no-store, no-cache, must-revalidate"),
                );
                self.headers.append(
                    CACHE_CONTROL,
                    HeaderValue::from_static("post-check=0, pre-check=0"),
                );
                self.headers
                    .append(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
                self.headers
                    .insert(PRAGMA, HeaderValue::from_static("no-cache"));
            }
            CachePolicy::Until(until) => {
                let max_age = until
                    .duration_since(SystemTime::now())
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                if let Ok(expires) = HeaderValue::from_str(&fmt_http_date(until)) {
                    self.headers.insert(EXPIRES, expires);
                }
                if let Ok(control) = HeaderValue::from_str(&format!("max-age={max_age}")) {
                    self.headers.insert(CACHE_CONTROL, control);
                }
                if self.header(PRAGMA.as_str()) == Some("no-cache") {
                    self.headers.remove(PRAGMA);
                }
            }
        }
    }

    /// Clear the response and point the client at `url`.
    pub fn redirect(&mut self, url: &str, status: u16) -> Result<(), FrameworkError> {
        reason_phrase(status).ok_or(FrameworkError::InvalidStatus { code: status })?;
        let (_, location) = header_pair(LOCATION.as_str(), url)?;
        self.clear();
        self.set_status(status)?;
        self.headers.insert(LOCATION, location);
        Ok(())
    }

    /// Write status line, headers and body to `out`.
    ///
    /// Queued cookies become `Set-Cookie` headers here and are consumed, so a
    /// second send does not repeat them.
    pub fn send<W: Write>(&mut self, out: &mut W, mode: &SendMode) -> io::Result<()> {
        for (name, cookie) in self.cookies.drain(..) {
            if let Ok(value) = HeaderValue::from_str(&cookie.header_value(&name)) {
                self.headers.append(SET_COOKIE, value);
            }
        }

        match mode {
            SendMode::Cgi => write!(out, "Status: {} {}\r\n", self.status, self.reason())?,
            SendMode::Http { protocol } => {
                write!(out, "{protocol} {} {}\r\n", self.status, self.reason())?
            }
        }
        for (name, value) in &self.headers {
            out.write_all(name.as_str().as_bytes())?;
            out.write_all(b": ")?;
            out.write_all(value.as_bytes())?;
            out.write_all(b"\r\n")?;
        }
        out.write_all(b"\r\n")?;
        out.write_all(self.body.as_bytes())?;
        out.flush()
    }
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), FrameworkError> {
    let invalid = || FrameworkError::InvalidHeader {
        name: name.to_string(),
    };
    let header_name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| invalid())?;
    let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
    Ok((header_name, header_value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_validation() {
        let mut response = Response::new();
        assert_eq!(response.status(), 200);
        response.set_status(404).unwrap();
        assert_eq!(response.reason(), "Not Found");
        assert!(matches!(
            response.set_status(299),
            Err(FrameworkError::InvalidStatus { code: 299 })
        ));
        assert_eq!(response.status(), 404);
    }

    #[test]
    fn test_headers_replace_and_append() {
        let mut response = Response::new();
        response.set_header("X-Trace", "a").unwrap();
        response.set_header("x-trace", "b").unwrap();
        response.append_header("X-Trace", "c").unwrap();
        assert_eq!(response.header_all("x-trace"), vec!["b", "c"]);
        assert!(response.remove_header("X-Trace"));
        assert!(response.header("x-trace").is_none());
        assert!(response.set_header("bad header", "x").is_err());
        assert!(response.set_header("X-Ok", "line\nbreak").is_err());
    }

    #[test]
    fn test_cache_disabled_then_enabled() {
        let mut response = Response::new();
        response.cache(CachePolicy::Disabled);
        assert_eq!(response.header("expires"), Some(EXPIRED_DATE));
        assert_eq!(response.header_all("cache-control").len(), 3);
        assert_eq!(response.header("pragma"), Some("no-cache"));

        response.cache(CachePolicy::Until(SystemTime::now() + Duration::from_secs(3600)));
        let control = response.header_all("cache-control");
        assert_eq!(control.len(), 1);
        assert!(control[0].starts_with("max-age="));
        assert!(response.header("pragma").is_none());
    }

    #[test]
    fn test_redirect_clears_previous_state() {
        let mut response = Response::new();
        response.append_body("stale");
        response.set_header("X-Old", "1").unwrap();
        response.redirect("/login", 302).unwrap();
        assert_eq!(response.status(), 302);
        assert_eq!(response.header("location"), Some("/login"));
        assert!(response.header("x-old").is_none());
        assert_eq!(response.body(), "");
    }

    #[test]
    fn test_rejected_redirect_keeps_response() {
        let mut response = Response::new();
        response.append_body("kept");
        response.set_header("X-Old", "1").unwrap();
        assert!(matches!(
            response.redirect("/login", 399),
            Err(FrameworkError::InvalidStatus { code: 399 })
        ));
        assert!(response.redirect("/bad\nurl", 302).is_err());
        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), "kept");
        assert_eq!(response.header("x-old"), Some("1"));
    }

    #[test]
    fn test_cache_until_far_future_is_clamped() {
        let mut response = Response::new();
        let until = SystemTime::UNIX_EPOCH + Duration::from_secs(400_000_000_000);
        response.cache(CachePolicy::Until(until));
        assert_eq!(response.header("expires"), Some("Fri, 31 Dec 9999 23:59:59 GMT"));
    }

    #[test]
    fn test_send_with_far_future_cookie() {
        let mut response = Response::new();
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(400_000_000_000);
        response.set_cookie("k", Cookie::new("v").expires(at));
        let mut out = Vec::new();
        response.send(&mut out, &SendMode::Cgi).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("set-cookie: k=v; expires=Fri, 31 Dec 9999 23:59:59 GMT\r\n"));
    }

    #[test]
    fn test_cookie_replace_and_delete() {
        let mut response = Response::new();
        response.set_cookie("theme", Cookie::new("dark"));
        response.set_cookie("theme", Cookie::new("light"));
        assert_eq!(response.cookies().len(), 1);
        assert_eq!(response.cookie("theme").unwrap().value, "light");

        response.delete_cookie("theme");
        assert!(response.cookie("theme").unwrap().value.is_empty());
    }

    #[test]
    fn test_send_cgi_writes_cookies_once() {
        let mut response = Response::new();
        response.set_status(201).unwrap();
        response.set_cookie("seen", Cookie::new("1"));
        response.append_body("done");

        let mut first = Vec::new();
        response.send(&mut first, &SendMode::Cgi).unwrap();
        let text = String::from_utf8(first).unwrap();
        assert!(text.starts_with("Status: 201 Created\r\n"));
        assert!(text.contains("set-cookie: seen=1\r\n"));
        assert!(text.ends_with("\r\n\r\ndone"));

        let mut second = Vec::new();
        response.send(&mut second, &SendMode::default()).unwrap();
        let text = String::from_utf8(second).unwrap();
        assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
        assert_eq!(text.matches("set-cookie").count(), 1);
    }
}
