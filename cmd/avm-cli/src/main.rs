mod cli;
mod run;

use clap::Parser;

fn main() {
    let options = cli::Options::parse();

    let filter = options
        .log_level
        .clone()
        .map(tracing_subscriber::EnvFilter::new)
        .unwrap_or_else(tracing_subscriber::EnvFilter::from_default_env);
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run::run(&options) {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}
