use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "forgetube", version, about = "Turn a topic into a narrated video")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of ~/.forgetube/config.toml or ./config.toml.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Overrides `output.root_dir`.
    #[arg(long, global = true)]
    pub output_dir: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeArgs {
    /// Defaults to `http_server.host`.
    #[arg(long)]
    pub host: Option<String>,

    /// Defaults to `http_server.port`.
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    #[arg(long)]
    pub topic: String,

    /// Video length in seconds; `script.default_duration_secs` when omitted.
    #[arg(long)]
    pub duration: Option<u64>,

    /// Comma separated, e.g. "moon,gravity".
    #[arg(long)]
    pub key_points: Option<String>,

    /// Review feedback applied to the generated script before media
    /// generation starts.
    #[arg(long)]
    pub feedback: Option<String>,

    /// Use the in-process providers: no network, no ffmpeg.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Falls back to `providers.gemini.api_key` / FORGETUBE_GEMINI_API_KEY.
    #[arg(long)]
    pub gemini_key: Option<String>,

    /// Falls back to `providers.serp.api_key` / FORGETUBE_SERP_API_KEY.
    #[arg(long)]
    pub serp_key: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ValidateArgs {
    /// Raw script JSON file.
    pub path: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP API.
    Serve(ServeArgs),
    /// Generate one video and exit.
    Run(RunArgs),
    /// Check a script file for synchronization problems.
    Validate(ValidateArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let args = Args::parse_from([
            "forgetube",
            "run",
            "--topic",
            "Ocean tides",
            "--duration",
            "45",
            "--key-points",
            "moon,sun",
            "--dry-run",
        ]);
        match args.command {
            Commands::Run(run) => {
                assert_eq!(run.topic, "Ocean tides");
                assert_eq!(run.duration, Some(45));
                assert_eq!(run.key_points.as_deref(), Some("moon,sun"));
                assert!(run.dry_run);
                assert!(run.feedback.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["forgetube", "serve", "--port", "9000", "--config", "x.toml"]);
        assert_eq!(args.config.as_deref(), Some("x.toml"));
        match args.command {
            Commands::Serve(serve) => {
                assert_eq!(serve.port, Some(9000));
                assert!(serve.host.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_run_requires_topic() {
        assert!(Args::try_parse_from(["forgetube", "run"]).is_err());
    }
}
