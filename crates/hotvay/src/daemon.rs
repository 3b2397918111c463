use std::{io, path::Path, sync::Arc};

use hotvay_engine::{
    ConfigSource, DeviceCfg, DeviceSource, DispatchCfg, Dispatcher, Result, SystemActions,
};
use tracing::{info, warn};

/// Run until SIGINT/SIGTERM, then stop the dispatcher.
///
/// Fails only when startup cannot complete: no home directory, a missing
/// config file, or a filesystem watcher that cannot be installed.
pub async fn run(config_path: Option<&Path>, device: DeviceCfg, dispatch: DispatchCfg) -> Result<()> {
    let path = config::resolve_config_path(config_path)?;
    info!(path = %path.display(), device = %device.device, policy = %device.policy, "hotvay_starting");

    let configs = ConfigSource::new(&path).watch()?;
    let devices = DeviceSource::real(device).subscribe();
    let dispatcher = Dispatcher::new(Arc::new(SystemActions), dispatch);
    dispatcher.start(configs, devices)?;

    let signal = wait_for_shutdown().await?;
    info!(signal, "shutdown_requested");
    let abandoned = dispatcher.stop().await;
    if abandoned > 0 {
        warn!(abandoned, "exiting_with_unfinished_actions");
    }
    info!("hotvay_stopped");
    Ok(())
}

/// Resolve on the first interrupt or terminate signal; yields its name.
#[cfg(unix)]
async fn wait_for_shutdown() -> io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = interrupt.recv() => Ok("SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

/// Resolve on Ctrl-C.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
