use std::any::Any;
use std::backtrace::BacktraceStatus;
use std::cell::RefCell;
use std::panic::{self, PanicHookInfo};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use minijinja::{context, Environment};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::FrameworkError;
use crate::http::Response;
use crate::logging::{LogLevel, Logger};

const PAGE_TITLE: &str = "Trellis Application Error";

const ERROR_PAGE: &str = r#"<html><head><title>{{ title }}</title><style>body{margin:0;padding:30px;font:12px/1.5 Helvetica,Arial,Verdana,sans-serif;}h1{margin:0;font-size:48px;font-weight:normal;line-height:48px;}strong{display:inline-block;width:65px;}</style></head><body><h1>{{ title }}</h1><p>The application could not run because of the following error:</p><h2>Details</h2><div><strong>Type:</strong> {{ report.kind }}</div>{% if report.code %}<div><strong>Code:</strong> {{ report.code }}</div>{% endif %}{% if report.message %}<div><strong>Message:</strong> {{ report.message }}</div>{% endif %}{% if report.file %}<div><strong>File:</strong> {{ report.file }}</div>{% endif %}{% if report.line %}<div><strong>Line:</strong> {{ report.line }}</div>{% endif %}{% if report.trace %}<h2>Trace</h2><pre>{% for frame in report.trace %}<div>{{ frame }}</div>{% endfor %}</pre>{% endif %}</body></html>"#;

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

#[derive(Debug, Clone)]
struct PanicLocation {
    file: String,
    line: u32,
}

/// Reference-counted installation of the recording hook.
///
/// The first guard swaps the hook in; the last one dropped restores `previous`.
struct HookState {
    active: usize,
    previous: Option<PanicHook>,
}

static PANIC_HOOK: Mutex<HookState> = Mutex::new(HookState {
    active: 0,
    previous: None,
});

thread_local! {
    // Written by the installed panic hook, read back by whoever catches the unwind.
    static LAST_PANIC: RefCell<Option<PanicLocation>> = const { RefCell::new(None) };
}

/// Extract a readable message from a `catch_unwind` payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Location of the most recent panic on this thread, if a hook recorded one.
pub(crate) fn take_panic_location() -> Option<(String, u32)> {
    LAST_PANIC
        .try_with(|slot| slot.borrow_mut().take())
        .ok()
        .flatten()
        .map(|loc| (loc.file, loc.line))
}

/// Everything the diagnostic page shows about a fatal error.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorReport {
    /// Error category (`FrameworkError`, `Error` or `Panic`)
    pub kind: String,
    /// Optional numeric code
    pub code: Option<i64>,
    /// Top-level message
    pub message: String,
    /// Source file, known for panics
    pub file: Option<String>,
    /// Source line, known for panics
    pub line: Option<u32>,
    /// Cause chain followed by backtrace frames when captured
    pub trace: Vec<String>,
}

impl ErrorReport {
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        let kind = if err.downcast_ref::<FrameworkError>().is_some() {
            "FrameworkError"
        } else {
            "Error"
        };
        let mut trace: Vec<String> = err
            .chain()
            .skip(1)
            .map(|cause| format!("caused by: {cause}"))
            .collect();
        let backtrace = err.backtrace();
        if backtrace.status() == BacktraceStatus::Captured {
            trace.extend(backtrace.to_string().lines().map(str::to_owned));
        }
        Self {
            kind: kind.to_string(),
            code: None,
            message: err.to_string(),
            file: None,
            line: None,
            trace,
        }
    }

    /// Build a report from a caught panic, picking up the location recorded by
    /// the hook [`ErrorHandler::register`] installs.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let (file, line) = match take_panic_location() {
            Some((file, line)) => (Some(file), Some(line)),
            None => (None, None),
        };
        Self {
            kind: "Panic".to_string(),
            code: None,
            message: panic_message(payload),
            file,
            line,
            trace: Vec::new(),
        }
    }

    /// One-line form used for the log record.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: \"{}\" at {} line {}",
            self.kind,
            self.message,
            self.file.as_deref().unwrap_or("unknown"),
            self.line.unwrap_or(0)
        )
    }
}

/// Request-scoped fatal error handler.
///
/// Always logs through the [`Logger`] service. With display mode on it replaces
/// the response with a 500 diagnostic page; otherwise the response becomes a bare
/// 500 with an empty body.
pub struct ErrorHandler {
    logger: Arc<Logger>,
    display: AtomicBool,
}

impl ErrorHandler {
    #[must_use]
    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            logger,
            display: AtomicBool::new(false),
        }
    }

    pub fn set_display(&self, display: bool) {
        self.display.store(display, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_display(&self) -> bool {
        self.display.load(Ordering::Relaxed)
    }

    /// Install the panic hook for the duration of one request.
    ///
    /// The hook only records where the panic happened; reporting is left to the
    /// code that catches the unwind. Guards from any thread share one
    /// installation: the hook stays in place while at least one guard is alive,
    /// and dropping the last one restores the hook that was active before.
    #[must_use]
    pub fn register(&self) -> PanicHookGuard {
        let mut state = PANIC_HOOK.lock().unwrap_or_else(PoisonError::into_inner);
        // `previous` survives when the last guard was dropped mid-panic; the
        // recording hook is then still installed and is reused.
        if state.active == 0 && state.previous.is_none() {
            state.previous = Some(panic::take_hook());
            panic::set_hook(Box::new(|info| {
                let location = info.location().map(|loc| PanicLocation {
                    file: loc.file().to_string(),
                    line: loc.line(),
                });
                // Thread-local may already be torn down during thread exit.
                let _ = LAST_PANIC.try_with(|slot| *slot.borrow_mut() = location);
            }));
        }
        state.active += 1;
        PanicHookGuard { _private: () }
    }

    /// Log a fatal error, panics at `critical`. Never fails.
    pub fn report(&self, report: &ErrorReport) {
        let level = if report.kind == "Panic" {
            LogLevel::Critical
        } else {
            LogLevel::Error
        };
        self.logger.log(level, &report.summary(), &Value::Null);
    }

    /// Log the error and turn `response` into the 500 the client will see.
    pub fn handle(&self, report: &ErrorReport, response: &mut Response) {
        self.report(report);

        response.clear();
        response.set_status_code(StatusCode::INTERNAL_SERVER_ERROR);
        if !self.is_display() {
            return;
        }

        match Self::render_page(report) {
            Ok(page) => {
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
                response.set_body(page);
            }
            Err(e) => {
                warn!(error = %e, "Failed to render diagnostic page");
            }
        }
    }

    /// Render the diagnostic page for `report`. Values are HTML-escaped.
    pub fn render_page(report: &ErrorReport) -> Result<String, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("error.html", ERROR_PAGE)?;
        env.get_template("error.html")?.render(context! {
            title => PAGE_TITLE,
            report => report,
        })
    }
}

/// Restores the previous panic hook when dropped.
pub struct PanicHookGuard {
    _private: (),
}

impl Drop for PanicHookGuard {
    fn drop(&mut self) {
        let mut state = PANIC_HOOK.lock().unwrap_or_else(PoisonError::into_inner);
        state.active = state.active.saturating_sub(1);
        // set_hook panics when called from a panicking thread
        if state.active > 0 || std::thread::panicking() {
            return;
        }
        if let Some(previous) = state.previous.take() {
            panic::set_hook(previous);
        }
    }
}
