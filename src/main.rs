// src/main.rs

use backhaul::config::load_and_validate;
use backhaul::errors::BackhaulError;
use backhaul::{cli, logging, run};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let code = match run_main().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("backhaul error: {err}");
            err.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run_main() -> Result<i32, BackhaulError> {
    let args = cli::parse();
    // An unreadable config file is a startup failure, not an internal one.
    let cfg = load_and_validate(&args.config).map_err(|e| match e {
        BackhaulError::IoError(io) => {
            BackhaulError::ConfigError(format!("reading {}: {io}", args.config.display()))
        }
        other => other,
    })?;
    logging::init_logging(args.log_level, cfg.config.diag_log.as_deref())
        .map_err(|e| BackhaulError::ConfigError(format!("{e:#}")))?;
    run(args, cfg).await
}
