//! # Logging Module
//!
//! Structured logging for trellis has two layers:
//!
//! - **Subscriber setup** ([`init_logging`]): a `tracing-subscriber` registry with an
//!   `EnvFilter` and a JSON or pretty `fmt` layer, writing to stderr or to daily
//!   rolling files through `tracing-appender`. Configured by [`LogConfig`], which is
//!   part of the application settings and can be overridden with `TRELLIS_LOG_*`
//!   environment variables.
//! - **The `logger` service** ([`Logger`]): the application-facing API with eight
//!   severities, an on/off switch and `{placeholder}` interpolation. Records are
//!   handed to a [`LogWriter`]; the default [`TracingWriter`] emits them as
//!   `tracing` events carrying a `severity` field.
//!
//! ## Environment Variables
//!
//! | Variable | Values | Default |
//! |----------|--------|---------|
//! | `TRELLIS_LOG_ENABLED` | `true`/`false` | `true` |
//! | `TRELLIS_LOG_LEVEL` | `trace`..`error` | `info` |
//! | `TRELLIS_LOG_FORMAT` | `json`/`pretty` | `pretty` |
//! | `TRELLIS_LOG_WRITER` | `stderr`/`file` | `stderr` |
//! | `TRELLIS_LOG_DIR` | path | `./log` |
//! | `TRELLIS_LOG_INCLUDE_LOCATION` | `true`/`false` | `false` |
//!
//! `RUST_LOG`, when set, replaces the level filter entirely.

mod config;
mod logger;

pub(crate) use config::env_flag;
pub use config::{init_logging, LogConfig, LogFormat, LogTarget};
pub use logger::{interpolate, LogLevel, LogWriter, Logger, TracingWriter};
