mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use commands::{EXIT_CAPACITY_ERROR, EXIT_CONFIG_ERROR, EXIT_FAILURE};
use std::path::PathBuf;
use std::process::ExitCode;
use topolab_compose::MergePolicy;

#[derive(Debug, Parser)]
#[command(
    name = "topolab",
    version,
    about = "Deterministic compiler and admission control for containerized network labs"
)]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MergeArg {
    /// Overrides replace the machine's base startup commands.
    Replace,
    /// Overrides run after the machine's base startup commands.
    Append,
}

impl From<MergeArg> for MergePolicy {
    fn from(arg: MergeArg) -> Self {
        match arg {
            MergeArg::Replace => Self::Replace,
            MergeArg::Append => Self::Append,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile a lab directory and write its compose manifest.
    Generate {
        /// Lab directory containing topology/lab.conf, lab.conf, or topolab.toml.
        #[arg(default_value = ".")]
        lab_dir: PathBuf,
        /// Output path (defaults to <lab_dir>/compose.yaml).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Per-machine startup override, as machine=command. Repeatable.
        #[arg(long = "startup", value_name = "MACHINE=COMMAND")]
        startup: Vec<String>,
        /// How startup overrides combine with base startup commands.
        #[arg(long, value_enum, default_value = "append")]
        merge: MergeArg,
    },
    /// Parse and validate a lab directory without writing anything.
    Check {
        /// Lab directory.
        #[arg(default_value = ".")]
        lab_dir: PathBuf,
    },
    /// Show the normalized lab model and its identity.
    Inspect {
        /// Lab directory.
        #[arg(default_value = ".")]
        lab_dir: PathBuf,
    },
    /// List known images and their capability records.
    Images,
    /// Estimate a lab's memory cost and startup time, and how many
    /// instances fit on this host.
    Estimate {
        /// Lab directory.
        #[arg(default_value = ".")]
        lab_dir: PathBuf,
        /// Static memory ceiling in bytes, used when host telemetry is
        /// unavailable.
        #[arg(long, value_name = "BYTES")]
        static_ceiling: Option<u64>,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("TOPOLAB_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;

    let result = match cli.command {
        Commands::Generate {
            lab_dir,
            output,
            startup,
            merge,
        } => commands::generate::run(
            &lab_dir,
            output.as_deref(),
            &startup,
            merge.into(),
            json_output,
        ),
        Commands::Check { lab_dir } => commands::check::run(&lab_dir, json_output),
        Commands::Inspect { lab_dir } => commands::inspect::run(&lab_dir, json_output),
        Commands::Images => commands::images::run(json_output),
        Commands::Estimate {
            lab_dir,
            static_ceiling,
        } => commands::estimate::run(&lab_dir, static_ceiling, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("config error:")
                || msg.starts_with("no lab configuration found")
                || msg.starts_with("compose error:")
            {
                EXIT_CONFIG_ERROR
            } else if msg.starts_with("admission error:") {
                EXIT_CAPACITY_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
