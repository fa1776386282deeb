//! `trellis-cgi`: run requests through the demo application.

fn main() -> anyhow::Result<()> {
    trellis::cli::run_cli()
}
