//! The hooks of the user application.

use std::any::Any;
use std::fmt::{Display, Formatter, Result as FmtResult};

use structopt::clap::{App, ArgMatches};

use crate::error::AnyError;
use crate::lifecycle::Lifecycle;

/// The application run by the [`Lifecycle`].
///
/// Only [`run`][Application::run] is mandatory. Both methods may fail (or even panic), in which
/// case the error is logged and the process is expected to exit with `-1`.
///
/// # Examples
///
/// ```rust
/// use appbase::prelude::*;
/// use structopt::clap::{App, ArgMatches};
/// use structopt::{StructOpt, StructOptInternal};
///
/// #[derive(Debug, StructOpt)]
/// struct Opts {
///     /// Who to greet.
///     #[structopt(long, default_value = "world")]
///     name: String,
/// }
///
/// struct Hello;
///
/// impl Application for Hello {
///     fn add_arguments<'a, 'b>(&mut self, app: App<'a, 'b>) -> Result<App<'a, 'b>, AnyError> {
///         Ok(Opts::augment_clap(app))
///     }
///
///     fn run(&mut self, base: &Lifecycle, matches: &ArgMatches) -> Result<Option<i32>, AnyError> {
///         let opts = Opts::from_clap(matches);
///         log::info!(target: base.name(), "Hello {}", opts.name);
///         Ok(None)
///     }
/// }
/// # let _ = Hello;
/// ```
pub trait Application {
    /// Adds the application's own command line arguments.
    ///
    /// The passed `app` already contains the arguments of the framework (`--verbose`,
    /// `--logging-config`, `--logging-dir` and `--config`). These must not be redefined.
    fn add_arguments<'a, 'b>(&mut self, app: App<'a, 'b>) -> Result<App<'a, 'b>, AnyError> {
        Ok(app)
    }

    /// The application body.
    ///
    /// It gets the fully initialized lifecycle (with logging set up and the configuration
    /// loaded) and the parsed command line.
    ///
    /// Returning `Ok(Some(code))` sets the exit code, `Ok(None)` means `0`. Returning the
    /// [`Exit`] error requests a specific exit code too, any other error means `-1`.
    fn run(&mut self, base: &Lifecycle, matches: &ArgMatches) -> Result<Option<i32>, AnyError>;
}

/// A request to terminate the application with the given exit code.
///
/// Return it (boxed into [`AnyError`]) from [`Application::run`], usually from deep inside the
/// application through `?`. `Exit(None)` means `0`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Exit(pub Option<i32>);

impl Display for Exit {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        match self.0 {
            Some(code) => write!(fmt, "Exit requested with code {}", code),
            None => write!(fmt, "Exit requested"),
        }
    }
}

impl std::error::Error for Exit {}

/// A panic caught in one of the [`Application`] hooks.
#[derive(Clone, Debug)]
pub struct Panicked {
    message: String,
}

impl Panicked {
    pub(crate) fn new(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&str>() {
            (*msg).to_owned()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "Unknown panic".to_owned()
        };
        Self { message }
    }

    /// The panic message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Panicked {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        write!(fmt, "Application panicked: {}", self.message)
    }
}

impl std::error::Error for Panicked {}
