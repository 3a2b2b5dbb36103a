#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! A helper to start command line applications in a well-behaved way.
//!
//! Every command line tool needs the same boring things before it gets to do its actual job. It
//! needs to parse the command line, set up logging and load (and check) its configuration. And
//! all of that should fail in a predictable way, with the reason written somewhere.
//!
//! This crate does these things in fixed stages, driven by the [`Lifecycle`]:
//!
//! * The command line is parsed (with [`structopt`]/`clap`). A few arguments are always there:
//!   `-v/--version`, `-vv/--verbose`, `--logging-config <path>`, `--logging-dir <path>` and
//!   `-c/--config <path>`. The application may add its own.
//! * The logging is set up, either from a logging configuration document (see [`appbase_log`])
//!   or from a built-in default. The default logs to stderr and into a timestamped log file.
//! * The application configuration (a JSON document) is found, loaded and validated against a
//!   JSON Schema.
//! * Some information about the environment is dumped into the debug log.
//! * The application is run.
//!
//! The logging and application configuration files are found the same way. A path from the
//! command line wins over a path set by the application in its [`Descriptor`]. If neither is
//! set, a list of directories (the current and home directory by default) is searched for a list
//! of filenames.
//!
//! Any failure ends with a logged error and the `-1` exit code.
//!
//! # Examples
//!
//! ```rust,no_run
//! use appbase::prelude::*;
//! use log::info;
//! use serde::Deserialize;
//! use structopt::clap::ArgMatches;
//!
//! #[derive(Deserialize)]
//! struct Cfg {
//!     message: String,
//! }
//!
//! struct Hello;
//!
//! impl Application for Hello {
//!     fn run(&mut self, base: &Lifecycle, _: &ArgMatches) -> Result<Option<i32>, AnyError> {
//!         let cfg: Cfg = base.config_as()?;
//!         info!(target: base.name(), "{}", cfg.message);
//!         Ok(None)
//!     }
//! }
//!
//! let descriptor = Descriptor::new("hello", env!("CARGO_PKG_VERSION"))
//!     .config_schema_path("/usr/share/hello/schema.json");
//! let mut lifecycle = Lifecycle::new(descriptor);
//! std::process::exit(lifecycle.start_env(&mut Hello));
//! ```

pub mod app;
pub mod cfg_loader;
pub mod descriptor;
mod diagnostics;
pub mod error;
pub mod lifecycle;
mod opts;
pub mod resolve;
pub mod utils;

pub use log::LevelFilter;

pub use crate::app::{Application, Exit, Panicked};
pub use crate::cfg_loader::ConfigError;
pub use crate::descriptor::Descriptor;
pub use crate::error::AnyError;
pub use crate::lifecycle::{Lifecycle, LoggingMode, State};
pub use crate::resolve::{Resolved, Source};

/// The most commonly needed things.
pub mod prelude {
    pub use super::{AnyError, Application, Descriptor, Exit, Lifecycle};
}
