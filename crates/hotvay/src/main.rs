//! Binary entrypoint for the hotvay keypad daemon.
use std::{path::PathBuf, process, time::Duration};

use clap::{Parser, Subcommand};
use hotvay_engine::{DeviceCfg, DispatchCfg, Error, ReconnectPolicy};
use logging::LogArgs;
use tokio::runtime::Builder;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*};

/// `hotvay check`: validate the config and exit.
mod check;
/// Long-running daemon: sources, dispatcher and signal handling.
mod daemon;

#[derive(Parser, Debug)]
#[command(name = "hotvay", about = "Run actions from a USB keypad", version)]
/// Command-line interface for the `hotvay` binary.
struct Cli {
    /// Optional subcommand.
    #[command(subcommand)]
    command: Option<Command>,

    /// Logging controls
    #[command(flatten)]
    log: LogArgs,

    /// Optional path to the config file (defaults to ~/.hotvay)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Keypad read timeout in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 200)]
    poll_ms: u64,

    /// What to do when the keypad goes away: resume or stop
    #[arg(long, value_name = "POLICY", default_value_t = ReconnectPolicy::Resume)]
    reconnect: ReconnectPolicy,

    /// How long to wait for running actions on shutdown, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 2000)]
    drain_ms: u64,
}

impl Cli {
    /// Device source settings from the flags.
    fn device_cfg(&self) -> DeviceCfg {
        DeviceCfg {
            poll_interval: Duration::from_millis(self.poll_ms.max(1)),
            policy: self.reconnect,
            ..DeviceCfg::default()
        }
    }

    /// Dispatcher settings from the flags.
    fn dispatch_cfg(&self) -> DispatchCfg {
        DispatchCfg {
            drain_timeout: Duration::from_millis(self.drain_ms),
        }
    }
}

#[derive(Subcommand, Debug)]
/// Top-level CLI subcommands.
enum Command {
    /// Load and validate the configuration then exit.
    Check {
        /// Path to configuration file to check (defaults to ~/.hotvay)
        path: Option<PathBuf>,

        /// Dump the parsed configuration as JSON to stdout
        #[arg(long)]
        dump: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let env_filter = logging::env_filter_from_spec(&cli.log.spec());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().without_time())
        .try_init()
        .ok();

    if let Some(Command::Check { path, dump }) = &cli.command {
        let explicit = path.as_deref().or(cli.config.as_deref());
        process::exit(check::run(explicit, *dump));
    }

    let runtime = match Builder::new_multi_thread()
        .enable_all()
        .thread_name("hotvay")
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start runtime");
            process::exit(1);
        }
    };

    let result = runtime.block_on(daemon::run(
        cli.config.as_deref(),
        cli.device_cfg(),
        cli.dispatch_cfg(),
    ));
    if let Err(e) = result {
        match e {
            Error::Config(e) => eprintln!("{}", e.pretty()),
            other => error!("{}", other),
        }
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_defaults() {
        let cli = Cli::try_parse_from(["hotvay"]).unwrap();
        assert!(cli.command.is_none());
        let device = cli.device_cfg();
        assert_eq!(device.poll_interval, DeviceCfg::default().poll_interval);
        assert_eq!(device.policy, ReconnectPolicy::Resume);
        assert_eq!(
            cli.dispatch_cfg().drain_timeout,
            DispatchCfg::default().drain_timeout
        );
    }

    #[test]
    fn parses_daemon_flags() {
        let cli = Cli::try_parse_from([
            "hotvay",
            "--config",
            "/tmp/keys.json",
            "--poll-ms",
            "50",
            "--reconnect",
            "stop",
            "--drain-ms",
            "10",
            "--debug",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/keys.json")));
        assert_eq!(cli.device_cfg().poll_interval, Duration::from_millis(50));
        assert_eq!(cli.reconnect, ReconnectPolicy::Stop);
        assert_eq!(cli.dispatch_cfg().drain_timeout, Duration::from_millis(10));
        assert!(cli.log.debug);
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(Cli::try_parse_from(["hotvay", "--reconnect", "sometimes"]).is_err());
    }

    #[test]
    fn check_subcommand() {
        let cli = Cli::try_parse_from(["hotvay", "check", "/tmp/x", "--dump"]).unwrap();
        match cli.command {
            Some(Command::Check { path, dump }) => {
                assert_eq!(path, Some(PathBuf::from("/tmp/x")));
                assert!(dump);
            }
            None => panic!("expected check"),
        }
    }
}
