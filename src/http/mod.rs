//! # HTTP Module
//!
//! Request and response wrappers for a single CGI-style request.
//!
//! A [`Request`] is built once from CGI meta-variables (`REQUEST_METHOD`,
//! `PATH_INFO`, `HTTP_*`...) and is read-only afterwards. A [`Response`]
//! accumulates status, headers, cookies and body until
//! [`Response::send`] writes it out, either with a CGI `Status:` line or a
//! plain HTTP status line.
//!
//! ```rust
//! use trellis::http::{Request, Response, SendMode};
//!
//! let request = Request::builder().method("GET").uri("/blog/7?draft=1").build();
//! assert_eq!(request.path_info(), "/blog/7");
//! assert_eq!(request.query("draft"), Some("1"));
//!
//! let mut response = Response::new();
//! response.append_body("hello");
//! let mut out = Vec::new();
//! response.send(&mut out, &SendMode::Cgi).unwrap();
//! assert!(out.starts_with(b"Status: 200 OK\r\n"));
//! ```

mod cookie;
mod request;
mod response;
mod status;

pub use cookie::{Cookie, CookieSettings};
pub use request::{Request, RequestBuilder};
pub use response::{CachePolicy, Response, SendMode};
pub use status::reason_phrase;
