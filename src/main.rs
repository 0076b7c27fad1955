use bundlekit::cli::{
    check_path, checksum_template, dry_run_template, keygen, render_template, unseal_bundle,
    validate_template, write_output,
};
use bundlekit::config::{RenderOptions, UnsealOptions};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// Version info from build.rs
const VERSION: &str = env!("BUNDLEKIT_VERSION");
const PROFILE: &str = env!("BUNDLEKIT_PROFILE");
const GIT_HASH: &str = env!("BUNDLEKIT_GIT_HASH");

fn get_version() -> &'static str {
    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();
    VERSION_STRING.get_or_init(|| format!("{} {} ({})", PROFILE, VERSION, GIT_HASH))
}

#[derive(Parser)]
#[command(name = "bundlekit")]
#[command(author, about = "Secret bundle templates with pluggable encryption schemes", long_about = None)]
struct Cli {
    /// Print version
    #[arg(short = 'V', long)]
    version: bool,

    /// Log filter when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a template's structure
    Validate {
        template: PathBuf,
    },

    /// Print a template's checksum
    #[command(alias = "sum")]
    Checksum {
        template: PathBuf,
    },

    /// Describe what rendering a template would do, without keys
    DryRun {
        template: PathBuf,
    },

    /// Render a template into a bundle
    #[command(alias = "r")]
    Render {
        template: PathBuf,

        /// Key assignment scheme=base64 (repeatable)
        #[arg(long = "key")]
        keys: Vec<String>,

        /// JSON key ring file
        #[arg(long)]
        keyring: Option<PathBuf>,

        /// Named value name=value for references (repeatable)
        #[arg(long = "set")]
        values: Vec<String>,

        /// Resolve env:NAME references from the environment
        #[arg(long)]
        allow_env: bool,

        /// Ignore BUNDLEKIT_KEYS
        #[arg(long)]
        no_env_keys: bool,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Open every sealed value of a bundle
    Unseal {
        bundle: PathBuf,

        /// Key assignment scheme=base64 (repeatable)
        #[arg(long = "key")]
        keys: Vec<String>,

        /// JSON key ring file
        #[arg(long)]
        keyring: Option<PathBuf>,

        /// Ignore BUNDLEKIT_KEYS
        #[arg(long)]
        no_env_keys: bool,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate key material for a built-in scheme
    Keygen {
        scheme: String,
    },

    /// Check a secret path against the ring layout
    CheckPath {
        path: String,
    },
}

fn init_logging(level: &str) -> Result<(), String> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .map_err(|e| format!("invalid log level '{}': {}", level, e))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("bundlekit {}", get_version());
        return ExitCode::SUCCESS;
    }

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            use clap::CommandFactory;
            let _ = Cli::command().print_help();
            println!();
            return ExitCode::SUCCESS;
        }
    };

    let result = match command {
        Commands::Validate { template } => validate_template(&template).map(Some),

        Commands::Checksum { template } => checksum_template(&template).map(Some),

        Commands::DryRun { template } => dry_run_template(&template).map(Some),

        Commands::Render {
            template,
            keys,
            keyring,
            values,
            allow_env,
            no_env_keys,
            output,
        } => {
            let options = RenderOptions {
                keyring,
                keys,
                values,
                allow_env,
                env_keys: !no_env_keys,
            };
            render_template(&template, &options)
                .and_then(|json| write_output(output.as_deref(), json))
        }

        Commands::Unseal {
            bundle,
            keys,
            keyring,
            no_env_keys,
            output,
        } => {
            let options = UnsealOptions {
                keyring,
                keys,
                env_keys: !no_env_keys,
            };
            unseal_bundle(&bundle, &options).and_then(|json| write_output(output.as_deref(), json))
        }

        Commands::Keygen { scheme } => keygen(&scheme).map(Some),

        Commands::CheckPath { path } => check_path(&path).map(Some),
    };

    match result {
        Ok(Some(text)) => {
            print!("{}", text);
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            for failure in e.failures().iter().skip(1) {
                eprintln!("  {}", failure);
            }
            ExitCode::FAILURE
        }
    }
}
