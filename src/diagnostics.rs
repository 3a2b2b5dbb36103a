//! The dump of the environment, for debugging.
//!
//! Everything is logged on the debug level under this module's target, so it can be silenced or
//! routed separately. Anything that can't be found out is reported as unavailable, nothing here
//! ever fails. Values of environment variables are never logged, only their names.

use std::env::{self, consts};
use std::fmt::Display;
use std::process;

use log::{debug, log_enabled, Level};

use crate::lifecycle::Lifecycle;
use crate::resolve::Resolved;

const UNAVAILABLE: &str = "<unavailable>";

fn fact<T: Display, E: Display>(value: Result<T, E>) -> String {
    match value {
        Ok(value) => value.to_string(),
        Err(e) => format!("{} ({})", UNAVAILABLE, e),
    }
}

fn origin(resolved: Option<&Resolved>) -> String {
    match resolved {
        Some(resolved) => format!("{} ({})", resolved.path.display(), resolved.source),
        None => "<none>".to_owned(),
    }
}

fn env_names() -> String {
    let mut names = env::vars_os()
        .map(|(name, _)| name.to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    names.sort();
    names.join(", ")
}

pub(crate) fn dump(lifecycle: &Lifecycle) {
    if !log_enabled!(Level::Debug) {
        return;
    }
    debug!("Framework version: {}", env!("CARGO_PKG_VERSION"));
    debug!(
        "Application: {} {}",
        lifecycle.name(),
        lifecycle.version()
    );
    debug!(
        "OS: {} ({} family, {}), distro: {}",
        consts::OS,
        consts::FAMILY,
        consts::ARCH,
        fact(whoami::fallible::distro()),
    );
    debug!(
        "Host: {}, user: {}, pid: {}",
        fact(whoami::fallible::hostname()),
        fact(whoami::fallible::username()),
        process::id(),
    );
    debug!(
        "Executable: {}",
        fact(env::current_exe().map(|exe| exe.display().to_string()))
    );
    debug!("Arguments: {:?}", env::args_os().collect::<Vec<_>>());
    debug!(
        "Working directory: {}",
        fact(env::current_dir().map(|dir| dir.display().to_string()))
    );
    debug!(
        "Home directory: {}",
        dirs::home_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|| UNAVAILABLE.to_owned())
    );
    debug!("Environment variables: {}", env_names());
    debug!("Descriptor: {}", fact(serde_json::to_string(lifecycle.descriptor())));
    debug!(
        "Log file: {}",
        lifecycle
            .logfile()
            .map(|logfile| logfile.display().to_string())
            .unwrap_or_else(|| "<none>".to_owned())
    );
    debug!("Logging mode: {:?}", lifecycle.logging_mode());
    debug!("Logging config: {}", origin(lifecycle.logging_config_path()));
    debug!(
        "Logging config searched in {:?} as {:?}",
        lifecycle.logging_search_paths(),
        lifecycle.logging_search_filenames()
    );
    debug!("Application config: {}", origin(lifecycle.config_path()));
    debug!(
        "Application config searched in {:?} as {:?}",
        lifecycle.config_search_paths(),
        lifecycle.config_search_filenames()
    );
}
