//! bakepay CLI
//!
//! Generates, pays and continually pays baker rewards.

mod continual;
mod engines;
mod output;
mod payout;
mod statistics;

use crate::continual::{run_continual, ContinualOptions};
use crate::engines::build_engines;
use crate::payout::{pay_blueprints, PayOptions};
use crate::statistics::collect_statistics;
use anyhow::Context;
use bakepay_core::{CyclePayoutBlueprint, PayoutError, RuntimeConfiguration};
use bakepay_core::engines::Collector;
use bakepay_engines::{FsReporter, SimulatedCollector};
use bakepay_pipeline::{generate_payouts, ExecutePayoutsOptions, GeneratePayoutsOptions, PreparePayoutsOptions};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const EXIT_SUCCESS: u8 = 0;
const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIGURATION_LOAD_FAILURE: u8 = 2;
const EXIT_INVALID_ARGS: u8 = 3;
const EXIT_OPERATION_FAILED: u8 = 4;

const STDIO: &str = "-";

#[derive(Parser)]
#[command(name = "bakepay")]
#[command(version)]
#[command(about = "Baker reward payouts - generate, prepare and execute", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "BAKEPAY_CONFIG", default_value = "bakepay.toml")]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the payout blueprint of a cycle
    Generate {
        /// Cycle to generate, defaults to the last completed one
        #[arg(long)]
        cycle: Option<i64>,

        /// Blueprint destination, `-` for stdout
        #[arg(short, long, default_value = STDIO)]
        output: String,

        /// Skip the payout balance check
        #[arg(long)]
        skip_balance_check: bool,
    },

    /// Prepare and execute generated blueprints
    Pay {
        /// Blueprint file, `-` for stdin; repeat to pay several cycles
        #[arg(short, long = "blueprint", required = true)]
        blueprints: Vec<String>,

        /// Combine payouts to the same recipient across cycles
        #[arg(long)]
        accumulate: bool,

        /// Batch and report without signing or broadcasting
        #[arg(long)]
        dry_run: bool,

        /// Pay contract recipients in the same batches as implicit accounts
        #[arg(long)]
        mix_in_contract_calls: bool,

        /// Pay token transfers in the same batches as native ones
        #[arg(long)]
        mix_in_fa_transfers: bool,
    },

    /// Pay every cycle as it completes
    Continual {
        /// First cycle to pay
        #[arg(long)]
        cycle: Option<i64>,

        /// Last cycle to pay
        #[arg(long)]
        end_cycle: Option<i64>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Aggregate earnings of recently paid cycles
    Statistics {
        /// Number of cycles to aggregate
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
        cycles: u32,

        /// Last cycle to aggregate, defaults to the last completed one
        #[arg(long)]
        last_cycle: Option<i64>,
    },

    /// Print the default configuration
    DefaultConfig,

    /// Version information
    Version,
}

fn init_logging(verbose: bool, format: LogFormat) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let json = format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
        }))
        .init();
}

fn load_configuration(path: &Path) -> anyhow::Result<Arc<RuntimeConfiguration>> {
    if !path.exists() {
        return Err(PayoutError::Configuration(format!("configuration file {} not found", path.display())).into());
    }
    Ok(Arc::new(RuntimeConfiguration::load(path)?))
}

fn read_blueprint(source: &str) -> anyhow::Result<CyclePayoutBlueprint> {
    let data = if source == STDIO {
        let mut data = String::new();
        std::io::stdin().read_to_string(&mut data)?;
        data
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading blueprint {}", source))?
    };
    Ok(CyclePayoutBlueprint::from_json(&data)?)
}

/// Cancel `token` on Ctrl-C; the in-flight batch still completes
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the in-flight batch");
            token.cancel();
        }
    });
}

fn exit_code(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<PayoutError>() {
        Some(PayoutError::Configuration(_) | PayoutError::MissingEngine(_)) => EXIT_CONFIGURATION_LOAD_FAILURE,
        Some(PayoutError::Serialization(_) | PayoutError::MissingPayoutBlueprint) => EXIT_INVALID_ARGS,
        Some(_) => EXIT_OPERATION_FAILED,
        None => EXIT_FAILURE,
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let cancellation = CancellationToken::new();

    match cli.command {
        Commands::Generate {
            cycle,
            output,
            skip_balance_check,
        } => {
            let configuration = load_configuration(&cli.config)?;
            let set = build_engines(&configuration, false, cancellation)?;
            let cycle = match cycle {
                Some(cycle) => cycle,
                None => set.collector.get_last_completed_cycle()?,
            };
            let options = GeneratePayoutsOptions {
                cycle,
                skip_balance_check,
                ..Default::default()
            };
            let engines = set.engines.clone();
            let blueprint =
                tokio::task::spawn_blocking(move || generate_payouts(configuration, engines, &options)).await??;

            let table = output::blueprint_table(&blueprint);
            if output == STDIO {
                println!("{}", blueprint.to_json_pretty()?);
                eprint!("{}", table);
            } else {
                std::fs::write(&output, blueprint.to_json_pretty()?)
                    .with_context(|| format!("writing blueprint {}", output))?;
                print!("{}", table);
                println!("Blueprint written to {}", output);
            }
        }

        Commands::Pay {
            blueprints,
            accumulate,
            dry_run,
            mix_in_contract_calls,
            mix_in_fa_transfers,
        } => {
            let configuration = load_configuration(&cli.config)?;
            let blueprints = blueprints
                .iter()
                .map(String::as_str)
                .map(read_blueprint)
                .collect::<anyhow::Result<Vec<_>>>()?;
            cancel_on_interrupt(cancellation.clone());
            let set = build_engines(&configuration, dry_run, cancellation)?;
            let options = PayOptions {
                prepare: PreparePayoutsOptions { accumulate },
                execute: ExecutePayoutsOptions {
                    dry_run,
                    mix_in_contract_calls,
                    mix_in_fa_transfers,
                },
            };

            let engines = set.engines.clone();
            let outcome =
                tokio::task::spawn_blocking(move || pay_blueprints(blueprints, configuration, engines, &options))
                    .await??;
            print!("{}", output::payout_table(&outcome.preparation, &outcome.result));
            if let Some(e) = outcome.error {
                return Err(e.into());
            }
            if !outcome.is_complete() {
                return Ok(EXIT_OPERATION_FAILED);
            }
        }

        Commands::Continual {
            cycle,
            end_cycle,
            dry_run,
        } => {
            let configuration = load_configuration(&cli.config)?;
            cancel_on_interrupt(cancellation.clone());
            let options = ContinualOptions {
                cycle,
                end_cycle,
                dry_run,
            };
            run_continual(configuration, options, cancellation).await?;
        }

        Commands::Statistics { cycles, last_cycle } => {
            let configuration = load_configuration(&cli.config)?;
            let last_cycle = match last_cycle {
                Some(cycle) => cycle,
                None => SimulatedCollector::open(&configuration.engines.data_dir)?.get_last_completed_cycle()?,
            };
            let reporter = FsReporter::new(&configuration.engines.reports_dir);
            let statistics = collect_statistics(&reporter, last_cycle, cycles);
            tracing::info!(cycles = ?statistics.collected_cycles, "Statistics generated");
            print!("{}", output::statistics_table(&statistics));
        }

        Commands::DefaultConfig => {
            print!("{}", RuntimeConfiguration::default_toml()?);
        }

        Commands::Version => {
            println!("bakepay v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(EXIT_SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            exit_code(&e)
        }
    };
    ExitCode::from(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_pay_flags() {
        let cli = Cli::try_parse_from([
            "bakepay",
            "pay",
            "--blueprint",
            "a.json",
            "--blueprint",
            "-",
            "--accumulate",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Pay {
                blueprints,
                accumulate,
                dry_run,
                mix_in_contract_calls,
                ..
            } => {
                assert_eq!(blueprints, vec!["a.json", "-"]);
                assert!(accumulate && dry_run && !mix_in_contract_calls);
            }
            _ => panic!("expected pay"),
        }
    }

    #[test]
    fn test_statistics_flags() {
        let cli = Cli::try_parse_from(["bakepay", "statistics", "--cycles", "5", "--last-cycle", "700"]).unwrap();
        match cli.command {
            Commands::Statistics { cycles, last_cycle } => {
                assert_eq!(cycles, 5);
                assert_eq!(last_cycle, Some(700));
            }
            _ => panic!("expected statistics"),
        }
        assert!(Cli::try_parse_from(["bakepay", "statistics", "--cycles", "0"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        let configuration: anyhow::Error = PayoutError::Configuration("x".into()).into();
        assert_eq!(exit_code(&configuration), EXIT_CONFIGURATION_LOAD_FAILURE);
        let arguments: anyhow::Error = PayoutError::MissingPayoutBlueprint.into();
        assert_eq!(exit_code(&arguments), EXIT_INVALID_ARGS);
        let operation: anyhow::Error = PayoutError::LockTimeout { cycle: 7 }.into();
        assert_eq!(exit_code(&operation), EXIT_OPERATION_FAILED);
        assert_eq!(exit_code(&anyhow::anyhow!("io")), EXIT_FAILURE);
    }

    #[test]
    fn test_blueprint_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("blueprint.json");
        let blueprint = CyclePayoutBlueprint {
            cycle: 42,
            ..Default::default()
        };
        std::fs::write(&path, blueprint.to_json().unwrap()).unwrap();
        assert_eq!(read_blueprint(path.to_str().unwrap()).unwrap(), blueprint);
        assert!(read_blueprint("/nonexistent/blueprint.json").is_err());
    }
}
