use clap::Parser;
use forgetube_cli::commands::{cli, run, validate};
use forgetube_cli::{http, logging};
use forgetube_core::api::{
    load_default, load_file, AppConfig, CliError, ErrorKind, Orchestrator, ProviderKind,
};
use std::path::Path;

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let mut cfg = load_config(args.config.as_deref())?;
    if let Some(dir) = args.output_dir.as_ref() {
        cfg.output.root_dir = dir.clone();
    }
    logging::init_tracing(&cfg.logging).map_err(CliError::Command)?;

    match args.command {
        cli::Commands::Serve(serve_args) => {
            let orchestrator = build_orchestrator(&cfg)?;
            logging::spawn_event_logger(orchestrator.subscribe());
            http::handle_serve(serve_args, cfg, orchestrator).await?;
            Ok(0)
        }
        cli::Commands::Run(run_args) => {
            if run_args.dry_run {
                cfg.providers.kind = ProviderKind::Fake;
            }
            let orchestrator = build_orchestrator(&cfg)?;
            logging::spawn_event_logger(orchestrator.subscribe());
            run::handle_run(run_args, &cfg, &orchestrator).await
        }
        cli::Commands::Validate(validate_args) => validate::handle_validate(&validate_args),
    }
}

fn load_config(path: Option<&str>) -> Result<AppConfig, CliError> {
    let loaded = match path {
        Some(p) => load_file(Path::new(p)).and_then(|mut cfg| {
            forgetube_core::api::apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
            Ok(cfg)
        }),
        None => load_default(),
    };
    loaded.map_err(|e| CliError::Config(format!("{e:#}")))
}

fn build_orchestrator(cfg: &AppConfig) -> Result<Orchestrator, CliError> {
    let stages = forgetube_plugins::build_stages(cfg)
        .map_err(|e| CliError::Config(format!("{e:#}")))?;
    Ok(Orchestrator::from_config(cfg, stages))
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 11: config error
    // 20: bad input / IO error
    // 30: pipeline failure
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Command(_) => 20,
        CliError::Io(_) => 20,
        CliError::Pipeline(_) => 30,
        CliError::Orchestrator(oe) => match oe.kind() {
            ErrorKind::Validation | ErrorKind::NotFound => 20,
            ErrorKind::Internal => 50,
            _ => 30,
        },
        CliError::Anyhow(_) => 50,
    }
}
