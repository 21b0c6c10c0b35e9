//! fwsim - Firewall Rule Simulator
//!
//! Command-line front end: test packets against a ruleset, edit rules
//! interactively, and turn rules or ready-made templates into firewall scripts.
//!
//! # Usage
//!
//! ```bash
//! # Would inbound RDP be let through?
//! fwsim test --rules rules.json --src 10.0.0.5 --dst 10.0.0.1 --port 3389
//!
//! fwsim shell --rules rules.json        # Interactive editor
//! fwsim render --format ufw             # Sample ruleset as a ufw script
//! fwsim templates                       # List ready-made scripts
//! fwsim export linux-web --output-dir out/
//! fwsim config set --rules-file rules.json
//! ```
//!
//! `test` exits with 0 when the packet is allowed and 1 when it is blocked.
//! Every command exits with 2 on error.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use fwsim::config::{self, AppConfig};
use fwsim::core::firewall::{Direction, Packet, PacketProtocol, Ruleset};
use fwsim::core::loader::load_ruleset;
use fwsim::core::script::ScriptFormat;
use fwsim::export::{self, ScriptTemplate};
use fwsim::session::{Session, describe_result};
use fwsim::validators::{validate_packet_ip, validate_packet_port};
use fwsim::{Error, Result, utils};

shadow_rs::shadow!(build);

const EXIT_BLOCKED: u8 = 1;
const EXIT_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "fwsim")]
#[command(version = build::PKG_VERSION, long_version = build::VERSION)]
#[command(about = "Firewall Rule Simulator - test packets against ordered rules", long_about = None)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one packet through the ruleset (exit 0 = allowed, 1 = blocked)
    Test {
        /// Rules file (JSON); defaults to the configured file, then the sample rules
        #[arg(short, long, value_name = "FILE")]
        rules: Option<PathBuf>,
        /// Source address [default: 192.168.1.100]
        #[arg(long, value_name = "IP")]
        src: Option<String>,
        /// Destination address [default: 192.168.1.1]
        #[arg(long, value_name = "IP")]
        dst: Option<String>,
        /// Destination port [default: 80]
        #[arg(long)]
        port: Option<String>,
        #[arg(long, default_value = "tcp")]
        protocol: PacketProtocol,
        #[arg(long, default_value = "inbound")]
        direction: Direction,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the ruleset as a ufw or netsh script
    Render {
        #[arg(short, long, value_name = "FILE")]
        rules: Option<PathBuf>,
        #[arg(short, long)]
        format: ScriptFormat,
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// List the ready-made firewall scripts
    Templates {
        /// Show the start of each script
        #[arg(long)]
        preview: bool,
    },
    /// Write a ready-made script (or "all" of them) to disk
    Export {
        /// Template key as shown by `fwsim templates`, or "all"
        key: String,
        /// Target directory; defaults to the configured export dir, then "."
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        /// Print to stdout instead of writing files
        #[arg(long, conflicts_with = "output_dir")]
        stdout: bool,
    },
    /// Edit rules and test packets interactively
    Shell {
        #[arg(short, long, value_name = "FILE")]
        rules: Option<PathBuf>,
    },
    /// Show or change saved settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current settings
    Show,
    /// Change one or more settings
    Set {
        /// Default rules file for commands without --rules
        #[arg(long, value_name = "PATH")]
        rules_file: Option<PathBuf>,
        /// Default directory for `export`
        #[arg(long, value_name = "PATH")]
        export_dir: Option<PathBuf>,
        /// Log to a file in the state directory instead of stderr
        #[arg(long, value_name = "BOOL")]
        log_to_file: Option<bool>,
    },
}

fn main() -> ExitCode {
    let _ = utils::ensure_dirs();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to create Tokio runtime: {e}");
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let config = runtime.block_on(config::load_config());
    init_logging(&cli, &config);

    match runtime.block_on(handle_cli(cli.command, config)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn init_logging(cli: &Cli, config: &AppConfig) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::WARN,
        (false, 1) => LevelFilter::INFO,
        (false, 2) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    };

    if config.log_to_file
        && let Some(mut log_path) = utils::get_state_dir()
    {
        log_path.push("fwsim.log");
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
        {
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(file)
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

async fn handle_cli(command: Commands, config: AppConfig) -> Result<ExitCode> {
    match command {
        Commands::Test {
            rules,
            src,
            dst,
            port,
            protocol,
            direction,
            json,
        } => {
            let ruleset = resolve_ruleset(rules, &config).await?;

            let defaults = Packet::default();
            let packet = Packet::new(
                packet_field("src", src, defaults.source_ip, validate_packet_ip)?,
                packet_field("dst", dst, defaults.destination_ip, validate_packet_ip)?,
                packet_field("port", port, defaults.port, validate_packet_port)?,
                protocol,
                direction,
            );

            let result = ruleset.evaluate(&packet);
            tracing::info!("{packet}: {}", result.verdict());

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Packet: {packet}");
                println!("{}", describe_result(&result));
            }

            return Ok(if result.allowed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_BLOCKED)
            });
        }
        Commands::Render {
            rules,
            format,
            output,
        } => {
            let ruleset = resolve_ruleset(rules, &config).await?;
            let script = ruleset.render(format);

            match output {
                Some(path) => {
                    let (dir, filename) = split_output_path(&path)?;
                    let written = export::write_script(dir, filename, &script).await?;
                    println!("Wrote {} ({} rules)", written.display(), ruleset.len());
                }
                None => print!("{script}"),
            }
        }
        Commands::Templates { preview } => {
            for template in export::all_templates() {
                println!(
                    "{:<12} {:<8} {:<32} {}",
                    template.key, template.platform, template.filename, template.title
                );
                if preview {
                    println!("\n{}\n", template.preview());
                }
            }
        }
        Commands::Export {
            key,
            output_dir,
            stdout,
        } => {
            let templates: Vec<&ScriptTemplate> = if key == "all" {
                export::all_templates().collect()
            } else {
                vec![export::find_template(&key)?]
            };

            if stdout {
                for template in templates {
                    print!("{}", template.content);
                }
            } else {
                let dir = output_dir.unwrap_or_else(|| config.export_dir_or_cwd());
                for template in templates {
                    let path =
                        export::write_script(&dir, template.filename, template.content).await?;
                    println!("Wrote {}", path.display());
                }
            }
        }
        Commands::Shell { rules } => {
            let ruleset = resolve_ruleset(rules, &config).await?;
            println!(
                "fwsim {} - {} rules loaded. Type \"help\" for commands.",
                build::PKG_VERSION,
                ruleset.len()
            );

            let mut session = Session::new(ruleset);
            tokio::task::spawn_blocking(move || {
                session.run(std::io::stdin().lock(), std::io::stdout())
            })
            .await
            .map_err(|e| Error::Internal(format!("session task failed: {e}")))??;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                if let Some(path) = config::config_path() {
                    println!("# {}", path.display());
                }
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::Set {
                rules_file,
                export_dir,
                log_to_file,
            } => {
                let mut config = config;
                if let Some(path) = rules_file {
                    // Refuse a default that every later command would fail on
                    let ruleset = load_ruleset(&path).await?;
                    println!("{}: {} rules", path.display(), ruleset.len());
                    config.rules_file = Some(path);
                }
                if let Some(dir) = export_dir {
                    config.export_dir = Some(dir);
                }
                if let Some(enabled) = log_to_file {
                    config.log_to_file = enabled;
                }

                config::save_config(&config).await?;
                println!("Settings saved.");
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}

/// Loads the rules file from `--rules`, else the configured one, else the sample rules.
async fn resolve_ruleset(rules: Option<PathBuf>, config: &AppConfig) -> Result<Ruleset> {
    match rules.or_else(|| config.rules_file.clone()) {
        Some(path) => load_ruleset(&path).await,
        None => {
            tracing::info!("No rules file given, using the sample ruleset");
            Ok(Ruleset::sample())
        }
    }
}

fn packet_field(
    field: &str,
    value: Option<String>,
    default: String,
    validate: fn(&str) -> std::result::Result<String, String>,
) -> Result<String> {
    match value {
        Some(value) => validate(&value).map_err(|m| Error::validation(field, m)),
        None => Ok(default),
    }
}

fn split_output_path(path: &Path) -> Result<(&Path, &str)> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::validation("output", format!("{} is not a file path", path.display())))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok((dir, filename))
}
