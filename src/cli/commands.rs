use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

use crate::app::{hooks, App};
use crate::http::{Request, SendMode};
use crate::logging::init_logging;
use crate::middleware::TracingMiddleware;
use crate::settings::Settings;

/// Command-line front end for the demo application
#[derive(Parser)]
#[command(name = "trellis-cgi")]
#[command(about = "Run requests through a trellis application", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Settings file (YAML, TOML or JSON)
    #[arg(short, long, global = true, env = "TRELLIS_CONFIG")]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Serve the request described by the CGI environment, writing to stdout
    Cgi,
    /// Build a request from flags and print the raw response
    Request {
        /// HTTP method
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Request target, with an optional query string
        #[arg(short, long, default_value = "/")]
        path: String,

        /// Request header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Request body
        #[arg(short, long)]
        body: Option<String>,

        /// Write an `HTTP/1.1` status line instead of a CGI `Status:` line
        #[arg(long, default_value_t = false)]
        http: bool,
    },
    /// List registered routes
    Routes,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// The demo application: a greeting with a route middleware, a numeric blog
/// route and a nested optional admin route.
pub fn demo_app(settings: Settings) -> Result<App> {
    let app = App::with_settings(settings);

    app.get("/", |_, ctx| ctx.echo("Hello World!"))?
        .middleware(|_, ctx| {
            ctx.echo("This is a route middleware!");
            Ok(())
        })
        .with_middleware(Arc::new(TracingMiddleware));

    app.get("/blog/@id:[0-9]+", |params, ctx| {
        let id = params.require("id")?;
        ctx.echo(id);
        Ok::<_, anyhow::Error>(())
    })?
    .with_middleware(Arc::new(TracingMiddleware));

    app.get(
        "/admin(/@module(/@controller(/@action)))(/@id)",
        |params, ctx| {
            for (label, key) in [("App", "module"), ("Controller", "controller"), ("Action", "action")] {
                ctx.echo(&format!("{label}: {}<br>", params.get(key).unwrap_or("")));
            }
        },
    )?
    .with_middleware(Arc::new(TracingMiddleware));

    app.hook(hooks::AFTER, |ctx| {
        ctx.echo("<hr>after hook<hr>");
        Ok(())
    });

    Ok(app)
}

/// Settings from `--config`, or defaults plus environment overrides.
pub fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load(path),
        None => Ok(Settings::from_env()),
    }
}

/// Execute a parsed command line, writing responses to `out`.
pub fn execute<W: Write>(cli: &Cli, settings: Settings, out: &mut W) -> Result<()> {
    let app = demo_app(settings)?;

    match &cli.command {
        Commands::Cgi => {
            let request = Request::from_env_with_body(io::stdin().lock())
                .context("Failed to read request body")?;
            app.run(request, out, &SendMode::Cgi)
        }
        Commands::Request {
            method,
            path,
            headers,
            body,
            http,
        } => {
            let mut builder = Request::builder()
                .method(method)
                .uri(path)
                .var("SERVER_PROTOCOL", "HTTP/1.1");
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
            if let Some(body) = body {
                builder = builder.body(body.as_bytes());
            }
            let request = builder.build();
            let mode = if *http {
                SendMode::Http {
                    protocol: request.protocol().to_string(),
                }
            } else {
                SendMode::Cgi
            };
            app.run(request, out, &mode)
        }
        Commands::Routes => {
            let router = app.router()?;
            let router = router.read().unwrap_or_else(PoisonError::into_inner);
            for route in router.routes() {
                let methods: Vec<&str> = route.methods().iter().map(|m| m.as_str()).collect();
                writeln!(out, "{:<20} {}", methods.join(","), route.pattern())?;
            }
            Ok(())
        }
    }
}

/// Parse arguments, initialize logging and run.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_ref())?;
    let _guard = init_logging(&settings.log)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(&cli, settings, &mut out)
}
