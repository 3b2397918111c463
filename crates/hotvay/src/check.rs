use std::path::Path;

use hotvay_engine::{RegistrationTable, SystemActions};

/// Validate the config at `explicit` (or the default path) and report.
///
/// Returns the process exit code.
pub fn run(explicit: Option<&Path>, dump: bool) -> i32 {
    let resolved = match config::resolve_config_path(explicit) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e.pretty());
            return 1;
        }
    };
    let cfg = match config::load_from_path(&resolved) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e.pretty());
            return 1;
        }
    };

    let table = RegistrationTable::build(&cfg, &SystemActions);
    for key in table.collisions() {
        eprintln!("warning: key {} is registered more than once; the last entry wins", key);
    }

    if dump {
        match serde_json::to_string_pretty(&cfg) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to serialize config: {e}");
                return 1;
            }
        }
    } else {
        println!(
            "OK: {} registrations ({} keys) in {}",
            cfg.len(),
            table.len(),
            resolved.display()
        );
    }
    0
}
