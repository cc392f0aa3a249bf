//! Callgate test application.
//!
//! Serves a handful of sample functions, one per accepted function shape.

use std::path::PathBuf;

use callgate::config::{ConfigError, ConfigLoader, GatewayConfig, DEFAULT_ENV_PREFIX};
use callgate::Gateway;

mod functions;

/// Command-line arguments.
struct Args {
    /// Path to a configuration file.
    config: Option<PathBuf>,
    /// Start from the development preset.
    development: bool,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut parsed = Self {
            config: None,
            development: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => parsed.config = args.next().map(PathBuf::from),
                "--dev" => parsed.development = true,
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("callgate-testapp {}", env!("CARGO_PKG_VERSION"));
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        parsed
    }
}

fn print_help() {
    println!(
        r"Callgate test application

USAGE:
    callgate-testapp [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Configuration file (TOML or JSON)
        --dev              Pretty debug logs
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    CALLGATE__SERVER__HTTP_ADDR       Bind address (default: 0.0.0.0:8080)
    CALLGATE__SECURITY__TOKEN         Required bearer token
    CALLGATE__LOGGING__LEVEL          Log filter (default: info)
    CALLGATE__REPORTING__ENDPOINT     Webhook receiving unexpected errors
"
    );
}

fn load_config(args: &Args) -> Result<GatewayConfig, ConfigError> {
    let mut loader = ConfigLoader::new();
    if args.development {
        loader = loader.with_development();
    }
    if let Some(path) = &args.config {
        loader = loader.with_file(path)?;
    }
    loader
        .with_dotenv()?
        .with_env_prefix(DEFAULT_ENV_PREFIX)
        .load()
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let mut gateway = Gateway::new(config);
    functions::register_all(&mut gateway);

    if let Err(e) = gateway.run().await {
        tracing::error!(error = %e, "Gateway stopped with an error");
        eprintln!("callgate-testapp: {e}");
        std::process::exit(1);
    }
}
