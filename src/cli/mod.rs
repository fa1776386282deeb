//! # CLI Module
//!
//! The `trellis-cgi` binary runs requests through the demo application.
//!
//! ## Commands
//!
//! ### `cgi`
//!
//! Serve the request described by the CGI environment (`REQUEST_METHOD`,
//! `PATH_INFO`, `HTTP_*`...), reading `CONTENT_LENGTH` bytes of body from stdin
//! and writing a CGI response to stdout:
//!
//! ```bash
//! REQUEST_METHOD=GET PATH_INFO=/blog/7 trellis-cgi cgi
//! ```
//!
//! ### `request`
//!
//! Build the request from flags instead:
//!
//! ```bash
//! trellis-cgi request --method GET --path '/admin/users/list' -H 'Accept: text/html' --http
//! ```
//!
//! ### `routes`
//!
//! List registered routes with their methods.
//!
//! All commands accept `--config <FILE>` (or `TRELLIS_CONFIG`) pointing at a
//! YAML, TOML or JSON settings file.

mod commands;


pub use commands::{demo_app, execute, load_settings, run_cli, Cli, Commands};
