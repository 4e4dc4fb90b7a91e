mod orchestrator;

use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("formgen=info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = orchestrator::run() {
        eprintln!("fatal: {err}");
        std::process::exit(1);
    }
}
