use std::collections::HashMap;
use std::io::{self, Read};
use std::net::IpAddr;

use http::Method;

/// Proxy headers consulted by [`Request::proxy_ip`], in priority order.
const PROXY_IP_VARS: [&str; 6] = [
    "HTTP_CLIENT_IP",
    "HTTP_X_FORWARDED_FOR",
    "HTTP_X_FORWARDED",
    "HTTP_X_CLUSTER_CLIENT_IP",
    "HTTP_FORWARDED_FOR",
    "HTTP_FORWARDED",
];

/// An incoming request, described by CGI meta-variables plus a body.
///
/// Everything is derived once at construction: the method, the path info the
/// router matches against, query and form parameters, and cookies. The raw
/// variables stay available through [`Request::var`].
#[derive(Debug, Clone)]
pub struct Request {
    vars: HashMap<String, String>,
    method: Method,
    path_info: String,
    query: Vec<(String, String)>,
    form: Vec<(String, String)>,
    cookies: HashMap<String, String>,
    body: Vec<u8>,
}

impl Default for Request {
    fn default() -> Self {
        Self::from_vars(Vec::<(String, String)>::new(), Vec::new())
    }
}

impl Request {
    /// Build from CGI variables (`REQUEST_METHOD`, `PATH_INFO`, `HTTP_*`...).
    pub fn from_vars<I, K, V>(vars: I, body: Vec<u8>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let method = vars
            .get("REQUEST_METHOD")
            .and_then(|m| Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).ok())
            .unwrap_or(Method::GET);

        let mut request = Self {
            vars,
            method,
            path_info: String::new(),
            query: Vec::new(),
            form: Vec::new(),
            cookies: HashMap::new(),
            body,
        };
        request.path_info = request.compute_path_info();
        request.query = parse_pairs(request.query_string());
        if request.media_type().as_deref() == Some("application/x-www-form-urlencoded") {
            request.form = url::form_urlencoded::parse(&request.body)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
        }
        request.cookies = request
            .vars
            .get("HTTP_COOKIE")
            .map(|c| parse_cookies(c))
            .unwrap_or_default();
        request
    }

    /// Build from the process environment, without a body.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars(), Vec::new())
    }

    /// Build from the process environment, reading `CONTENT_LENGTH` bytes of
    /// body from `input`.
    pub fn from_env_with_body<R: Read>(input: R) -> io::Result<Self> {
        let vars: Vec<(String, String)> = std::env::vars().collect();
        let length = vars
            .iter()
            .find(|(k, _)| k == "CONTENT_LENGTH")
            .and_then(|(_, v)| v.trim().parse::<u64>().ok())
            .unwrap_or(0);
        let mut body = Vec::new();
        input.take(length).read_to_end(&mut body)?;
        Ok(Self::from_vars(vars, body))
    }

    #[must_use]
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// A raw CGI variable.
    #[must_use]
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path below the script, always starting with `/`.
    #[must_use]
    pub fn path_info(&self) -> &str {
        &self.path_info
    }

    /// Script name followed by path info.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}{}", self.script_name(), self.path_info)
    }

    #[must_use]
    pub fn script_name(&self) -> &str {
        self.var("SCRIPT_NAME")
            .or_else(|| self.var("ORIG_SCRIPT_NAME"))
            .unwrap_or("")
    }

    #[must_use]
    pub fn request_uri(&self) -> String {
        if let Some(uri) = self.var("HTTP_X_REWRITE_URL").or_else(|| self.var("REQUEST_URI")) {
            return uri.to_string();
        }
        match (self.var("ORIG_PATH_INFO"), self.var("QUERY_STRING")) {
            (Some(path), Some(query)) => format!("{path}?{query}"),
            (Some(path), None) => path.to_string(),
            _ => String::new(),
        }
    }

    fn query_string(&self) -> &str {
        if let Some(query) = self.var("QUERY_STRING") {
            return query;
        }
        self.var("REQUEST_URI")
            .and_then(|uri| uri.split_once('?'))
            .map(|(_, query)| query)
            .unwrap_or("")
    }

    fn compute_path_info(&self) -> String {
        let raw = if let Some(path) = self.var("PATH_INFO") {
            path.to_string()
        } else if let Some(path) = self.var("ORIG_PATH_INFO") {
            let mut path = path.to_string();
            if self.script_name().ends_with('/') {
                path.push('/');
            }
            path
        } else {
            let script_name = self.script_name();
            let script_dir = match script_name.rfind('/') {
                Some(pos) => &script_name[..=pos],
                None => "",
            };
            let uri = self.request_uri();
            let uri_path = uri.split(['?', '#']).next().unwrap_or("");
            if !script_name.is_empty() && uri_path.starts_with(script_name) {
                uri_path[script_name.len()..].to_string()
            } else if uri_path.starts_with(script_dir) {
                uri_path[script_dir.len()..].to_string()
            } else {
                String::new()
            }
        };
        format!("/{}", raw.trim_start_matches('/'))
    }

    /// First query parameter named `key`.
    #[must_use]
    pub fn query(&self, key: &str) -> Option<&str> {
        find_pair(&self.query, key)
    }

    #[must_use]
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    /// First form field named `key` from a urlencoded body.
    #[must_use]
    pub fn post(&self, key: &str) -> Option<&str> {
        find_pair(&self.form, key)
    }

    #[must_use]
    pub fn form_params(&self) -> &[(String, String)] {
        &self.form
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    /// A request header by its HTTP name (`X-Requested-With`, `content-type`...).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        let key = name.trim().to_ascii_uppercase().replace('-', "_");
        match key.as_str() {
            "CONTENT_TYPE" | "CONTENT_LENGTH" => self.var(&key),
            _ => self.var(&format!("HTTP_{key}")),
        }
    }

    /// All request headers with lowercase, dash-separated names.
    #[must_use]
    pub fn headers(&self) -> Vec<(String, &str)> {
        let mut headers: Vec<(String, &str)> = self
            .vars
            .iter()
            .filter_map(|(k, v)| {
                let name = match k.strip_prefix("HTTP_") {
                    Some(rest) => rest,
                    None if k == "CONTENT_TYPE" || k == "CONTENT_LENGTH" => k.as_str(),
                    None => return None,
                };
                Some((name.to_ascii_lowercase().replace('_', "-"), v.as_str()))
            })
            .collect();
        headers.sort();
        headers
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as text; invalid UTF-8 is replaced.
    #[must_use]
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.var("CONTENT_TYPE")
    }

    /// Content type without parameters, lowercased (`text/html`).
    #[must_use]
    pub fn media_type(&self) -> Option<String> {
        self.content_type()
            .and_then(|ct| ct.split([';', ',']).next())
            .map(|mt| mt.trim().to_ascii_lowercase())
            .filter(|mt| !mt.is_empty())
    }

    /// The `charset` parameter of the content type.
    #[must_use]
    pub fn content_charset(&self) -> Option<&str> {
        self.content_type()?
            .split(';')
            .skip(1)
            .filter_map(|param| param.split_once('='))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("charset"))
            .map(|(_, v)| v.trim().trim_matches('"'))
    }

    #[must_use]
    pub fn content_length(&self) -> u64 {
        self.var("CONTENT_LENGTH")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Host name without port, preferring `X-Forwarded-Host`.
    #[must_use]
    pub fn host(&self) -> String {
        let Some(host) = self
            .var("HTTP_X_FORWARDED_HOST")
            .or_else(|| self.var("HTTP_HOST"))
        else {
            return self.var("SERVER_NAME").unwrap_or("").to_string();
        };
        if host.starts_with('[') {
            if let Some(end) = host.find(']') {
                return host[..=end].to_string();
            }
        }
        host.split(':').next().unwrap_or(host).to_string()
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.var("SERVER_PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(80)
    }

    #[must_use]
    pub fn host_with_port(&self) -> String {
        format!("{}:{}", self.host(), self.port())
    }

    /// First label of a host with more than two labels.
    #[must_use]
    pub fn subdomain(&self) -> Option<String> {
        let host = self.host();
        let parts: Vec<&str> = host.split('.').collect();
        if parts.len() > 2 {
            Some(parts[0].to_string())
        } else {
            None
        }
    }

    #[must_use]
    pub fn scheme(&self) -> &'static str {
        match self.var("HTTPS") {
            Some(v) if !v.eq_ignore_ascii_case("off") => "https",
            _ => "http",
        }
    }

    #[must_use]
    pub fn protocol(&self) -> &str {
        self.var("SERVER_PROTOCOL").unwrap_or("HTTP/1.1")
    }

    /// Scheme and host, with the port when it is not the scheme's default.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = self.scheme();
        let port = self.port();
        let mut url = format!("{scheme}://{}", self.host());
        if (scheme == "https" && port != 443) || (scheme == "http" && port != 80) {
            url.push_str(&format!(":{port}"));
        }
        url
    }

    /// First public address found in the proxy headers.
    #[must_use]
    pub fn proxy_ip(&self) -> Option<IpAddr> {
        PROXY_IP_VARS.iter().find_map(|key| {
            self.var(key)?
                .split(',')
                .filter_map(|candidate| candidate.trim().parse::<IpAddr>().ok())
                .find(is_public_ip)
        })
    }

    /// Proxy address when there is one, otherwise `REMOTE_ADDR`.
    #[must_use]
    pub fn client_ip(&self) -> Option<IpAddr> {
        self.proxy_ip()
            .or_else(|| self.var("REMOTE_ADDR")?.trim().parse().ok())
    }

    #[must_use]
    pub fn referrer(&self) -> Option<&str> {
        self.var("HTTP_REFERER")
    }

    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.var("HTTP_USER_AGENT")
    }

    #[must_use]
    pub fn is_ajax(&self) -> bool {
        self.var("HTTP_X_REQUESTED_WITH")
            .or_else(|| self.var("X_REQUESTED_WITH"))
            == Some("XMLHttpRequest")
    }

    /// No `Host` header: invoked from a terminal rather than a web server.
    #[must_use]
    pub fn is_cli(&self) -> bool {
        self.var("HTTP_HOST").is_none()
    }

    #[must_use]
    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    #[must_use]
    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    #[must_use]
    pub fn is_put(&self) -> bool {
        self.method == Method::PUT
    }

    #[must_use]
    pub fn is_patch(&self) -> bool {
        self.method == Method::PATCH
    }

    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.method == Method::DELETE
    }

    #[must_use]
    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    #[must_use]
    pub fn is_options(&self) -> bool {
        self.method == Method::OPTIONS
    }
}

/// Builds requests from parts, for tests and the command line.
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    vars: HashMap<String, String>,
    cookies: Vec<String>,
    body: Vec<u8>,
}

impl RequestBuilder {
    #[must_use]
    pub fn method(mut self, method: &str) -> Self {
        self.vars
            .insert("REQUEST_METHOD".to_string(), method.to_string());
        self
    }

    /// Request target, optionally with a query string (`/blog/1?page=2`).
    #[must_use]
    pub fn uri(mut self, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, query),
            None => (uri, ""),
        };
        self.vars.insert("REQUEST_URI".to_string(), uri.to_string());
        self.vars.insert("PATH_INFO".to_string(), path.to_string());
        self.vars
            .insert("QUERY_STRING".to_string(), query.to_string());
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let key = name.trim().to_ascii_uppercase().replace('-', "_");
        let key = match key.as_str() {
            "CONTENT_TYPE" | "CONTENT_LENGTH" => key,
            _ => format!("HTTP_{key}"),
        };
        self.vars.insert(key, value.to_string());
        self
    }

    #[must_use]
    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push(format!("{name}={value}"));
        self
    }

    /// Set an arbitrary CGI variable.
    #[must_use]
    pub fn var(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn build(mut self) -> Request {
        if !self.cookies.is_empty() {
            self.vars
                .insert("HTTP_COOKIE".to_string(), self.cookies.join("; "));
        }
        if !self.body.is_empty() && !self.vars.contains_key("CONTENT_LENGTH") {
            self.vars
                .insert("CONTENT_LENGTH".to_string(), self.body.len().to_string());
        }
        Request::from_vars(self.vars, self.body)
    }
}

fn find_pair<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn parse_pairs(raw: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn parse_cookies(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim();
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            Some((name.to_string(), value))
        })
        .collect()
}

fn is_public_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || a == 0
                || a >= 240
                || (a == 100 && (64..128).contains(&b)))
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Request {
        Request::from_vars(pairs.iter().map(|(k, v)| (*k, *v)), Vec::new())
    }

    #[test]
    fn test_path_info_from_path_info_var() {
        let req = vars(&[("PATH_INFO", "blog/42")]);
        assert_eq!(req.path_info(), "/blog/42");
    }

    #[test]
    fn test_path_info_from_request_uri_minus_script() {
        let req = vars(&[
            ("SCRIPT_NAME", "/index.php"),
            ("REQUEST_URI", "/index.php/admin/users?x=1"),
        ]);
        assert_eq!(req.path_info(), "/admin/users");
        assert_eq!(req.query("x"), Some("1"));

        let rewritten = vars(&[
            ("SCRIPT_NAME", "/app/index.php"),
            ("REQUEST_URI", "/app/blog/7"),
        ]);
        assert_eq!(rewritten.path_info(), "/blog/7");
    }

    #[test]
    fn test_path_info_defaults_to_root() {
        assert_eq!(Request::default().path_info(), "/");
        assert_eq!(Request::default().method(), Method::GET);
    }

    #[test]
    fn test_orig_path_info_keeps_script_slash() {
        let req = vars(&[("ORIG_PATH_INFO", "/docs"), ("SCRIPT_NAME", "/app/")]);
        assert_eq!(req.path_info(), "/docs/");
    }

    #[test]
    fn test_builder_sets_method_headers_cookies_and_form() {
        let req = Request::builder()
            .method("post")
            .uri("/login?next=%2Fhome")
            .header("Content-Type", "application/x-www-form-urlencoded; charset=UTF-8")
            .header("X-Requested-With", "XMLHttpRequest")
            .cookie("theme", "dark%20blue")
            .body("user=ada&remember=on")
            .build();

        assert!(req.is_post());
        assert_eq!(req.path_info(), "/login");
        assert_eq!(req.query("next"), Some("/home"));
        assert_eq!(req.media_type().as_deref(), Some("application/x-www-form-urlencoded"));
        assert_eq!(req.content_charset(), Some("UTF-8"));
        assert_eq!(req.post("user"), Some("ada"));
        assert_eq!(req.content_length(), 20);
        assert_eq!(req.cookie("theme"), Some("dark blue"));
        assert!(req.is_ajax());
        assert_eq!(req.header("x-requested-with"), Some("XMLHttpRequest"));
    }

    #[test]
    fn test_host_port_and_url() {
        let req = vars(&[
            ("HTTP_HOST", "api.example.com:8443"),
            ("SERVER_PORT", "8443"),
            ("HTTPS", "on"),
        ]);
        assert_eq!(req.host(), "api.example.com");
        assert_eq!(req.scheme(), "https");
        assert_eq!(req.url(), "https://api.example.com:8443");
        assert_eq!(req.subdomain().as_deref(), Some("api"));
        assert!(!req.is_cli());

        let forwarded = vars(&[("HTTP_HOST", "internal"), ("HTTP_X_FORWARDED_HOST", "example.org")]);
        assert_eq!(forwarded.host(), "example.org");
        assert_eq!(forwarded.url(), "http://example.org");
        assert!(forwarded.subdomain().is_none());
    }

    #[test]
    fn test_proxy_ip_skips_private_ranges() {
        let req = vars(&[
            ("HTTP_CLIENT_IP", "10.0.0.8"),
            ("HTTP_X_FORWARDED_FOR", "192.168.1.1, 203.0.113.9"),
            ("REMOTE_ADDR", "127.0.0.1"),
        ]);
        assert_eq!(req.proxy_ip(), Some("203.0.113.9".parse().unwrap()));

        let direct = vars(&[("REMOTE_ADDR", "127.0.0.1")]);
        assert_eq!(direct.proxy_ip(), None);
        assert_eq!(direct.client_ip(), Some("127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_headers_listing() {
        let req = vars(&[("HTTP_USER_AGENT", "curl"), ("CONTENT_TYPE", "text/plain"), ("PATH_INFO", "/")]);
        assert_eq!(
            req.headers(),
            vec![
                ("content-type".to_string(), "text/plain"),
                ("user-agent".to_string(), "curl")
            ]
        );
        assert_eq!(req.user_agent(), Some("curl"));
    }
}
