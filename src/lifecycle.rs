//! The staged start of an application.
//!
//! The [`Lifecycle`] takes an [`Application`] through these stages, in this order:
//!
//! 1. Parsing the command line. The framework arguments are registered first, then the
//!    application is given a chance to [add its own][Application::add_arguments].
//! 2. Setting up the logging and loading the application configuration.
//! 3. Dumping a lot of information about the environment on the debug level.
//! 4. [Running][Application::run] the application.
//!
//! Any failure (including a panic in the application hooks) ends the whole thing. The error is
//! logged (the logging is set up to the defaults first if it isn't yet) and the exit code is
//! `-1`. Nothing ever escapes from [`start`][Lifecycle::start], the caller gets only the exit
//! code to pass to [`std::process::exit`].

use std::env;
use std::ffi::OsString;
use std::fmt::Display;
use std::fs;
use std::iter;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use appbase_log::LoggingConfig;
use chrono::Local;
use err_context::prelude::*;
use log::{debug, error, info, trace, warn, Level, LevelFilter};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use structopt::clap::{App, ArgMatches, ErrorKind};
use structopt::{StructOpt, StructOptInternal};

use crate::app::{Application, Exit, Panicked};
use crate::cfg_loader::{self, ConfigError};
use crate::descriptor::Descriptor;
use crate::diagnostics;
use crate::error::{log_error, AnyError, ErrorLogFormat};
use crate::opts::{self, CommonOpts};
use crate::resolve::{Lookup, Resolved};

const SUCCESS: i32 = 0;
const FAILURE: i32 = -1;

/// The stage the [`Lifecycle`] is in.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum State {
    /// Not started yet.
    Created,
    /// The command line is parsed.
    ArgsParsed,
    /// The logging is set up.
    LoggingReady,
    /// The application configuration is loaded (or not needed).
    ConfigReady,
    /// The application is running.
    Running,
    /// The application finished and produced an exit code.
    Succeeded,
    /// Something failed, the exit code is `-1`.
    Failed,
}

/// Which logging got installed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum LoggingMode {
    /// The built-in configuration.
    Default,
    /// A logging configuration document.
    Custom,
}

/// Returned when [`start`][Lifecycle::start] is called for the second time.
#[derive(Copy, Clone, Debug, thiserror::Error)]
#[error("The lifecycle was already started")]
pub struct AlreadyStarted;

/// Returned from [`config_as`][Lifecycle::config_as] if there's no configuration.
#[derive(Copy, Clone, Debug, thiserror::Error)]
#[error("No application configuration was loaded")]
pub struct NoConfig;

fn search_paths(configured: &Option<Vec<PathBuf>>) -> Vec<PathBuf> {
    configured.clone().unwrap_or_else(|| {
        env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::home_dir())
            .collect()
    })
}

/// The driver of the application start.
///
/// Created from a [`Descriptor`] and then [started][Lifecycle::start] exactly once. During
/// [`Application::run`], it gives access to the loaded configuration and details about how
/// everything was set up.
///
/// # Examples
///
/// ```rust,no_run
/// use appbase::prelude::*;
/// use structopt::clap::ArgMatches;
///
/// struct Hello;
///
/// impl Application for Hello {
///     fn run(&mut self, base: &Lifecycle, _: &ArgMatches) -> Result<Option<i32>, AnyError> {
///         log::info!(target: base.name(), "Config: {:?}", base.config());
///         Ok(None)
///     }
/// }
///
/// let mut lifecycle = Lifecycle::new(Descriptor::new("hello", "1.0.0"));
/// std::process::exit(lifecycle.start_env(&mut Hello));
/// ```
#[derive(Debug)]
pub struct Lifecycle {
    descriptor: Descriptor,
    state: State,
    opts: CommonOpts,
    logging_mode: Option<LoggingMode>,
    logging_search_paths: Vec<PathBuf>,
    logging_search_filenames: Vec<String>,
    logging_config_path: Option<Resolved>,
    logfile: Option<PathBuf>,
    config_search_paths: Vec<PathBuf>,
    config_search_filenames: Vec<String>,
    config_path: Option<Resolved>,
    config: Option<Value>,
    failure: Option<AnyError>,
}

impl Lifecycle {
    /// Creates the lifecycle.
    ///
    /// The default search paths (the current and home directory) are decided here.
    pub fn new(descriptor: Descriptor) -> Self {
        let logging_search_filenames = descriptor
            .logging_config_search_filenames
            .clone()
            .unwrap_or_else(|| descriptor.default_logging_filenames());
        let config_search_filenames = descriptor
            .config_search_filenames
            .clone()
            .unwrap_or_else(|| descriptor.default_config_filenames());
        Self {
            logging_search_paths: search_paths(&descriptor.logging_config_search_paths),
            logging_search_filenames,
            config_search_paths: search_paths(&descriptor.config_search_paths),
            config_search_filenames,
            descriptor,
            state: State::Created,
            opts: CommonOpts::default(),
            logging_mode: None,
            logging_config_path: None,
            logfile: None,
            config_path: None,
            config: None,
            failure: None,
        }
    }

    /// Runs the whole lifecycle with the command line of the process.
    pub fn start_env<A: Application>(&mut self, app: &mut A) -> i32 {
        self.start(app, env::args_os().skip(1))
    }

    /// Runs the whole lifecycle.
    ///
    /// The `args` are the command line arguments, without the program name.
    ///
    /// Returns the exit code: `0` or whatever the application asked for on success, `-1` on any
    /// failure. Asking for help or version prints it and returns `0` without running the
    /// application.
    pub fn start<A, I, T>(&mut self, app: &mut A, args: I) -> i32
    where
        A: Application,
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        if self.state != State::Created {
            // Not recorded as the failure, the first run keeps its outcome
            let e: AnyError = AlreadyStarted.into();
            log_error(Level::Error, module_path!(), &e, ErrorLogFormat::SingleLine);
            error!("Exiting! (exit_code={})", FAILURE);
            return FAILURE;
        }

        let matches = match self.parse_args(app, args) {
            Ok(Some(matches)) => matches,
            Ok(None) => {
                self.state = State::Succeeded;
                return SUCCESS;
            }
            Err(e) => return self.fail("Failed to parse the command line", e),
        };
        self.state = State::ArgsParsed;
        trace!("Parsed command line {:?}", self.opts);

        if let Err(e) = self.init_logging() {
            return self.fail("Failed to set up logging", e);
        }
        self.state = State::LoggingReady;

        if let Err(e) = self.init_config() {
            return self.fail("Failed to load the application configuration", e);
        }
        self.state = State::ConfigReady;

        diagnostics::dump(self);

        self.state = State::Running;
        self.run(app, &matches)
    }

    fn parse_args<A, I, T>(&mut self, app: &mut A, args: I) -> Result<Option<ArgMatches<'static>>, AnyError>
    where
        A: Application,
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        debug!("Parsing the command line");
        let version = self.descriptor.version.clone();
        let clap = App::new(self.descriptor.name.clone())
            .version(version.as_str())
            .version_short("v");
        let clap = CommonOpts::augment_clap(clap);
        let clap = match panic::catch_unwind(AssertUnwindSafe(|| app.add_arguments(clap))) {
            Ok(clap) => clap?,
            Err(payload) => return Err(Panicked::new(payload).into()),
        };

        let args = iter::once(OsString::from(&self.descriptor.name)).chain(opts::normalize(args));
        match clap.get_matches_from_safe(args) {
            Ok(matches) => {
                self.opts = CommonOpts::from_clap(&matches);
                Ok(Some(matches))
            }
            Err(e) if matches!(e.kind, ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed) => {
                // Clap prints the version on its own, but leaves the help to us
                if !e.message.is_empty() {
                    println!("{}", e.message);
                }
                Ok(None)
            }
            Err(e) => {
                eprintln!("{}", e.message);
                Err(e.into())
            }
        }
    }

    fn forced_level(&self) -> Option<LevelFilter> {
        if self.opts.verbose {
            Some(LevelFilter::Debug)
        } else {
            self.descriptor.force_log_level
        }
    }

    fn prepare_logfile(&mut self) -> Result<PathBuf, AnyError> {
        if let Some(logfile) = &self.logfile {
            return Ok(logfile.clone());
        }
        let dir = match self.opts.logging_dir.as_ref().or(self.descriptor.logfile_dir.as_ref()) {
            Some(dir) => dir.clone(),
            None => env::current_dir().context("Can't find the current directory")?,
        };
        fs::create_dir_all(&dir)
            .with_context(|_| format!("Can't create the log directory {}", dir.display()))?;
        let name = self.descriptor.logfile_name.clone().unwrap_or_else(|| {
            format!("{}_{}.log", Local::now().format("%Y%m%d%H%M%S"), self.descriptor.name)
        });
        let logfile = dir.join(name);
        self.logfile = Some(logfile.clone());
        Ok(logfile)
    }

    fn apply_default_logging(&mut self) -> Result<(), AnyError> {
        let logfile = self.prepare_logfile()?;
        let mut cfg = LoggingConfig::builtin();
        cfg.set_default_format(
            self.descriptor.logging_default_format.as_deref(),
            self.descriptor.logging_default_date_format.as_deref(),
        );
        if let Some(level) = self.forced_level() {
            cfg.force_level(level);
        }
        cfg.redirect_files(&logfile);
        cfg.apply()
            .with_context(|_| format!("Can't set up the default logging into {}", logfile.display()))?;
        self.logging_mode = Some(LoggingMode::Default);
        debug!("Default logging set up, logging into {}", logfile.display());
        Ok(())
    }

    fn init_logging(&mut self) -> Result<(), AnyError> {
        let descriptor = &self.descriptor;
        if !descriptor.custom_logging && !descriptor.default_logging {
            debug!("Logging set up disabled, keeping the current logger");
            return Ok(());
        }
        if descriptor.custom_logging {
            self.logging_config_path = Lookup {
                cli: self.opts.logging_config.as_deref(),
                explicit: descriptor.logging_config_path.as_deref(),
                dirs: &self.logging_search_paths,
                names: &self.logging_search_filenames,
            }
            .resolve();
        }

        match self.logging_config_path.clone() {
            Some(resolved) => {
                let logfile = self.prepare_logfile()?;
                appbase_log::initialize(&resolved.path, Some(&logfile), self.forced_level())
                    .with_context(|_| {
                        format!(
                            "Can't set up logging from {} ({})",
                            resolved.path.display(),
                            resolved.source,
                        )
                    })?;
                self.logging_mode = Some(LoggingMode::Custom);
                debug!(
                    "Logging set up from {} ({}), logging into {}",
                    resolved.path.display(),
                    resolved.source,
                    logfile.display(),
                );
            }
            // Without a custom config, the defaults are used even if they were disabled
            None => self.apply_default_logging()?,
        }
        Ok(())
    }

    fn init_config(&mut self) -> Result<(), AnyError> {
        let descriptor = &self.descriptor;
        if !descriptor.config_init {
            debug!("Loading of the application configuration is disabled");
            return Ok(());
        }
        self.config_path = Lookup {
            cli: self.opts.config.as_deref(),
            explicit: descriptor.config_path.as_deref(),
            dirs: &self.config_search_paths,
            names: &self.config_search_filenames,
        }
        .resolve();

        let resolved = match &self.config_path {
            Some(resolved) => resolved,
            None => {
                return Err(ConfigError::NotDiscovered {
                    dirs: self.config_search_paths.clone(),
                    names: self.config_search_filenames.clone(),
                }
                .into())
            }
        };
        debug!(
            "Loading the application configuration from {} ({})",
            resolved.path.display(),
            resolved.source
        );
        let config = match cfg_loader::load(&resolved.path, descriptor.config_schema_path.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                error!(
                    "Application config {} ({})",
                    resolved.path.display(),
                    resolved.source
                );
                return Err(e.into());
            }
        };
        self.config = Some(config);
        Ok(())
    }

    fn run<A: Application>(&mut self, app: &mut A, matches: &ArgMatches) -> i32 {
        info!(target: self.name(), "{} (version={}) started!", self.name(), self.version());
        let base = &*self;
        let result = panic::catch_unwind(AssertUnwindSafe(|| app.run(base, matches)))
            .unwrap_or_else(|payload| Err(Panicked::new(payload).into()));
        let code = match result {
            Ok(code) => code.unwrap_or(SUCCESS),
            Err(e) => match e.downcast::<Exit>() {
                Ok(exit) => {
                    debug!("{}", exit);
                    exit.0.unwrap_or(SUCCESS)
                }
                Err(e) => return self.fail("The application failed", e),
            },
        };
        self.state = State::Succeeded;
        info!("Exiting (exit_code={})", code);
        code
    }

    // Makes sure there's somewhere to log the failure to.
    fn ensure_logging(&mut self) {
        let descriptor = &self.descriptor;
        if self.logging_mode.is_some() || (!descriptor.custom_logging && !descriptor.default_logging) {
            return;
        }
        if let Err(e) = self.apply_default_logging() {
            appbase_log::install_fallback();
            warn!("Falling back to logging into stderr");
            log_error(Level::Warn, module_path!(), &e, ErrorLogFormat::MultiLine);
        }
    }

    fn fail<W: Display>(&mut self, what: W, e: AnyError) -> i32 {
        self.ensure_logging();
        error!("{}", what);
        log_error(Level::Error, module_path!(), &e, ErrorLogFormat::MultiLine);
        error!("Exiting! (exit_code={})", FAILURE);
        self.state = State::Failed;
        self.failure = Some(e);
        FAILURE
    }

    /// The descriptor this was created with.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// The name of the application.
    ///
    /// Useful as a log target.
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// The version of the application.
    pub fn version(&self) -> &str {
        self.descriptor.version()
    }

    /// The current stage.
    pub fn state(&self) -> State {
        self.state
    }

    /// Was the `--verbose` flag used?
    pub fn verbose(&self) -> bool {
        self.opts.verbose
    }

    /// Which logging was set up, if any.
    pub fn logging_mode(&self) -> Option<LoggingMode> {
        self.logging_mode
    }

    /// The logging configuration document used, if any was found.
    pub fn logging_config_path(&self) -> Option<&Resolved> {
        self.logging_config_path.as_ref()
    }

    /// Where the file handlers log to.
    pub fn logfile(&self) -> Option<&Path> {
        self.logfile.as_deref()
    }

    /// Directories searched for the logging configuration.
    pub fn logging_search_paths(&self) -> &[PathBuf] {
        &self.logging_search_paths
    }

    /// Filenames searched for as the logging configuration.
    pub fn logging_search_filenames(&self) -> &[String] {
        &self.logging_search_filenames
    }

    /// The application configuration file used, if any was found.
    pub fn config_path(&self) -> Option<&Resolved> {
        self.config_path.as_ref()
    }

    /// Directories searched for the application configuration.
    pub fn config_search_paths(&self) -> &[PathBuf] {
        &self.config_search_paths
    }

    /// Filenames searched for as the application configuration.
    pub fn config_search_filenames(&self) -> &[String] {
        &self.config_search_filenames
    }

    /// The loaded application configuration.
    ///
    /// This is `None` if loading of the configuration is disabled (or it didn't happen yet).
    pub fn config(&self) -> Option<&Value> {
        self.config.as_ref()
    }

    /// Decodes the application configuration into a structure.
    ///
    /// The error points to the offending field.
    pub fn config_as<T: DeserializeOwned>(&self) -> Result<T, AnyError> {
        let config = self.config.as_ref().ok_or(NoConfig)?;
        Ok(serde_path_to_error::deserialize(config)?)
    }

    /// The error that terminated the lifecycle, if any.
    ///
    /// Typed errors can be extracted with
    /// [`downcast_ref`](https://doc.rust-lang.org/std/error/trait.Error.html#method.downcast_ref),
    /// for example [`ConfigError`].
    pub fn failure(&self) -> Option<&AnyError> {
        self.failure.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::PoisonError;

    use regex_lite::Regex;
    use serde::Deserialize;
    use serde_json::json;
    use structopt::clap::Arg;
    use tempfile::TempDir;

    use super::*;
    use crate::resolve::Source;
    use crate::tests::LOCK;


    const NAME: &str = "test_application";

    const SCHEMA: &str = r#"{
        "type": "object",
        "properties": {
            "example_parameter_integer": {"type": "integer"},
            "example_parameter_string": {"type": "string"},
            "example_parameter_float": {"type": "number"}
        },
        "required": ["example_parameter_integer", "example_parameter_string"]
    }"#;

    const CONFIG: &str = r#"{
        "example_parameter_integer": 42,
        "example_parameter_string": "foo",
        "example_parameter_float": 3.14
    }"#;

    type Outcome = fn() -> Result<Option<i32>, AnyError>;

    struct TestApp {
        outcome: Outcome,
        fail_arguments: bool,
        ran: bool,
        name: Option<String>,
        config: Option<Value>,
    }

    impl TestApp {
        fn new(outcome: Outcome) -> Self {
            Self {
                outcome,
                fail_arguments: false,
                ran: false,
                name: None,
                config: None,
            }
        }

        fn ok() -> Self {
            Self::new(|| Ok(None))
        }
    }

    impl Application for TestApp {
        fn add_arguments<'a, 'b>(&mut self, app: App<'a, 'b>) -> Result<App<'a, 'b>, AnyError> {
            if self.fail_arguments {
                return Err("Broken arguments".into());
            }
            Ok(app.arg(Arg::with_name("name").long("name").takes_value(true)))
        }

        fn run(&mut self, base: &Lifecycle, matches: &ArgMatches) -> Result<Option<i32>, AnyError> {
            error!(target: NAME, "test log line");
            warn!(target: NAME, "test log line");
            info!(target: NAME, "test log line");
            debug!(target: NAME, "test log line");
            self.ran = true;
            self.name = matches.value_of("name").map(str::to_owned);
            self.config = base.config().cloned();
            (self.outcome)()
        }
    }

    struct Env {
        _lock: std::sync::MutexGuard<'static, ()>,
        dir: TempDir,
    }

    impl Env {
        fn new() -> Self {
            let lock = LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            Self {
                _lock: lock,
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn write(&self, name: &str, content: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            fs::write(&path, content).unwrap();
            path
        }

        // Searches only in the scratch directory, so nothing from the machine sneaks in.
        fn descriptor(&self) -> Descriptor {
            Descriptor::new(NAME, "0.1.0")
                .logging_config_search_paths(vec![self.dir.path()])
                .config_search_paths(vec![self.dir.path()])
                .logfile_dir(self.dir.path().join("logs"))
        }

        fn with_config(&self) -> Descriptor {
            self.write("test_application_config.json", CONFIG);
            let schema = self.write("schema.json", SCHEMA);
            self.descriptor().config_schema_path(schema)
        }
    }

    fn log_content(lifecycle: &Lifecycle) -> String {
        fs::read_to_string(lifecycle.logfile().unwrap()).unwrap()
    }

    fn has_line(content: &str, level: &str) -> bool {
        content.contains(&format!("[{}][{}]: test log line", level, NAME))
    }

    #[test]
    fn config_found_by_search() {
        let env = Env::new();
        let mut lifecycle = Lifecycle::new(env.with_config());
        let mut app = TestApp::ok();
        assert_eq!(0, lifecycle.start(&mut app, Vec::<OsString>::new()));
        assert_eq!(
            Some(json!({
                "example_parameter_integer": 42,
                "example_parameter_string": "foo",
                "example_parameter_float": 3.14,
            })),
            app.config
        );
        assert_eq!(State::Succeeded, lifecycle.state());
        assert_eq!(Some(LoggingMode::Default), lifecycle.logging_mode());
        let config_path = lifecycle.config_path().unwrap();
        assert_eq!(Source::Search, config_path.source);
        assert_eq!(env.dir.path().join("test_application_config.json"), config_path.path);
        assert!(lifecycle.failure().is_none());
    }

    #[test]
    fn schema_violation() {
        let env = Env::new();
        let descriptor = env.with_config();
        env.write(
            "test_application_config.json",
            r#"{"example_parameter_integer": "many", "example_parameter_string": "foo"}"#,
        );
        let mut lifecycle = Lifecycle::new(descriptor);
        let mut app = TestApp::ok();
        assert_eq!(-1, lifecycle.start(&mut app, Vec::<OsString>::new()));
        assert!(!app.ran);
        assert_eq!(State::Failed, lifecycle.state());
        let failure = lifecycle.failure().unwrap();
        assert!(matches!(
            failure.downcast_ref::<ConfigError>(),
            Some(ConfigError::Invalid { .. })
        ));
        let content = log_content(&lifecycle);
        assert!(content.contains("doesn't match schema"));
        let origin = format!(
            "[ERROR][appbase::lifecycle]: Application config {} (search)",
            env.dir.path().join("test_application_config.json").display()
        );
        assert!(content.contains(&origin), "{}", content);
        assert!(content.contains("Exiting! (exit_code=-1)"));
    }

    #[test]
    fn run_error() {
        let env = Env::new();
        let mut lifecycle = Lifecycle::new(env.with_config());
        let mut app = TestApp::new(|| Err("Something went wrong".into()));
        assert_eq!(-1, lifecycle.start(&mut app, Vec::<OsString>::new()));
        assert!(app.ran);
        let content = log_content(&lifecycle);
        assert!(content.contains("Something went wrong"));
        assert!(content.contains("Exiting! (exit_code=-1)"));
    }

    #[test]
    fn run_panic() {
        let env = Env::new();
        let mut lifecycle = Lifecycle::new(env.descriptor().config_init(false));
        let mut app = TestApp::new(|| panic!("Out of cheese"));
        assert_eq!(-1, lifecycle.start(&mut app, Vec::<OsString>::new()));
        assert!(lifecycle.failure().unwrap().downcast_ref::<Panicked>().is_some());
        assert!(log_content(&lifecycle).contains("Out of cheese"));
    }

    #[test]
    fn default_logfile() {
        let env = Env::new();
        let mut lifecycle = Lifecycle::new(env.descriptor().config_init(false));
        assert_eq!(0, lifecycle.start(&mut TestApp::ok(), Vec::<OsString>::new()));

        let logfile = lifecycle.logfile().unwrap();
        assert_eq!(env.dir.path().join("logs"), logfile.parent().unwrap());
        let name = logfile.file_name().unwrap().to_str().unwrap();
        assert!(Regex::new(r"^\d{14}_\S+?\.log$").unwrap().is_match(name), "{}", name);
        assert!(name.ends_with("_test_application.log"));

        let content = log_content(&lifecycle);
        assert!(has_line(&content, "ERROR"));
        assert!(has_line(&content, "WARN"));
        assert!(has_line(&content, "INFO"));
        assert!(!has_line(&content, "DEBUG"));
        let started = "[INFO][test_application]: test_application (version=0.1.0) started!";
        assert!(content.contains(started), "{}", content);
    }

    #[test]
    fn verbose_logs_debug() {
        let env = Env::new();
        let mut lifecycle = Lifecycle::new(env.descriptor().config_init(false));
        assert_eq!(0, lifecycle.start(&mut TestApp::ok(), vec!["-vv"]));
        assert!(lifecycle.verbose());
        assert!(has_line(&log_content(&lifecycle), "DEBUG"));
    }

    #[test]
    fn forced_level_logs_debug() {
        let env = Env::new();
        let descriptor = env
            .descriptor()
            .config_init(false)
            .force_log_level(LevelFilter::Debug)
            .logfile_name("forced.log");
        let mut lifecycle = Lifecycle::new(descriptor);
        assert_eq!(0, lifecycle.start(&mut TestApp::ok(), Vec::<OsString>::new()));
        assert_eq!(env.dir.path().join("logs/forced.log"), lifecycle.logfile().unwrap());
        let content = log_content(&lifecycle);
        assert!(has_line(&content, "DEBUG"));
        // The diagnostics dump is on the debug level as well
        assert!(content.contains("appbase::diagnostics"));
    }

    #[test]
    fn custom_logging_found_by_search() {
        let env = Env::new();
        let path = env.write(
            "custom_logging.yaml",
            r#"
formatters:
  custom:
    format: "CUSTOM {level} {message}"
handlers:
  file:
    class: file
    formatter: custom
    filename: somewhere-else.log
root:
  level: INFO
  handlers: [file]
"#,
        );
        let descriptor = env
            .descriptor()
            .config_init(false)
            .logging_config_search_filenames(vec!["custom_logging.yaml"]);
        let mut lifecycle = Lifecycle::new(descriptor);
        assert_eq!(0, lifecycle.start(&mut TestApp::ok(), Vec::<OsString>::new()));
        assert_eq!(Some(LoggingMode::Custom), lifecycle.logging_mode());
        let resolved = lifecycle.logging_config_path().unwrap();
        assert_eq!(path, resolved.path);
        assert_eq!(Source::Search, resolved.source);
        let content = log_content(&lifecycle);
        assert!(content.contains("CUSTOM WARN test log line"));
        assert!(!content.contains("CUSTOM DEBUG test log line"));
    }

    #[test]
    fn broken_custom_logging() {
        let env = Env::new();
        let path = env.write("broken.yaml", "root:\n  handlers: [missing]\n");
        let descriptor = env.descriptor().config_init(false).logging_config_path(&path);
        let mut lifecycle = Lifecycle::new(descriptor);
        let mut app = TestApp::ok();
        assert_eq!(-1, lifecycle.start(&mut app, Vec::<OsString>::new()));
        assert!(!app.ran);
        assert_eq!(Some(LoggingMode::Default), lifecycle.logging_mode());
        assert_eq!(Source::Explicit, lifecycle.logging_config_path().unwrap().source);
        let content = log_content(&lifecycle);
        assert!(content.contains("unknown handler missing"));
        assert!(content.contains("Exiting! (exit_code=-1)"));
    }

    #[test]
    fn broken_arguments() {
        let env = Env::new();
        let mut lifecycle = Lifecycle::new(env.descriptor().config_init(false));
        let mut app = TestApp::ok();
        app.fail_arguments = true;
        assert_eq!(-1, lifecycle.start(&mut app, Vec::<OsString>::new()));
        assert!(!app.ran);
        assert_eq!(Some(LoggingMode::Default), lifecycle.logging_mode());
        assert!(log_content(&lifecycle).contains("Broken arguments"));
    }

    #[test]
    fn unknown_argument() {
        let env = Env::new();
        let mut lifecycle = Lifecycle::new(env.descriptor().config_init(false));
        let mut app = TestApp::ok();
        assert_eq!(-1, lifecycle.start(&mut app, vec!["--no-such-flag"]));
        assert!(!app.ran);
        assert_eq!(State::Failed, lifecycle.state());
    }

    #[test]
    fn application_arguments() {
        let env = Env::new();
        let mut lifecycle = Lifecycle::new(env.descriptor().config_init(false));
        let mut app = TestApp::ok();
        assert_eq!(0, lifecycle.start(&mut app, vec!["--name", "Alice"]));
        assert_eq!(Some("Alice"), app.name.as_deref());
    }

    #[test]
    fn exit_codes() {
        let env = Env::new();
        let outcomes: &[(Outcome, i32)] = &[
            (|| Ok(None), 0),
            (|| Ok(Some(0)), 0),
            (|| Ok(Some(5)), 5),
            (|| Err(Exit(Some(3)).into()), 3),
            (|| Err(Exit(None).into()), 0),
        ];
        for (outcome, expected) in outcomes {
            let mut lifecycle = Lifecycle::new(env.descriptor().config_init(false));
            assert_eq!(*expected, lifecycle.start(&mut TestApp::new(*outcome), Vec::<OsString>::new()));
            assert_eq!(State::Succeeded, lifecycle.state());
        }
    }

    #[test]
    fn config_disabled() {
        let env = Env::new();
        let mut lifecycle = Lifecycle::new(env.descriptor().config_init(false));
        let mut app = TestApp::ok();
        assert_eq!(0, lifecycle.start(&mut app, Vec::<OsString>::new()));
        assert!(app.config.is_none());
        assert!(lifecycle.config_path().is_none());
        assert!(lifecycle.config_as::<Value>().is_err());
    }

    #[test]
    fn config_problems() {
        let env = Env::new();
        let config = env.write("present.json", CONFIG);
        let cases = vec![
            (env.descriptor().config_path(env.dir.path().join("missing.json")), "FileNotFound"),
            (
                env.descriptor()
                    .config_path(&config)
                    .config_schema_path(env.dir.path().join("missing.schema.json")),
                "SchemaFileNotFound",
            ),
            (env.descriptor(), "NotDiscovered"),
        ];
        for (descriptor, expected) in cases {
            let mut lifecycle = Lifecycle::new(descriptor);
            let mut app = TestApp::ok();
            assert_eq!(-1, lifecycle.start(&mut app, Vec::<OsString>::new()), "{}", expected);
            assert!(!app.ran);
            let failure = lifecycle.failure().unwrap().downcast_ref::<ConfigError>().unwrap();
            let kind = match failure {
                ConfigError::FileNotFound { .. } => "FileNotFound",
                ConfigError::SchemaFileNotFound { .. } => "SchemaFileNotFound",
                ConfigError::NotDiscovered { .. } => "NotDiscovered",
                _ => "other",
            };
            assert_eq!(expected, kind);
        }
    }

    #[test]
    fn command_line_wins() {
        let env = Env::new();
        let explicit = env.write("explicit.json", r#"{"from": "explicit"}"#);
        let cli = env.write("cli.json", r#"{"from": "cli"}"#);
        let logs = env.dir.path().join("cli-logs");
        let mut lifecycle = Lifecycle::new(env.descriptor().config_path(&explicit));
        let mut app = TestApp::ok();
        let args = vec![
            OsString::from("-c"),
            cli.clone().into(),
            "--logging-dir".into(),
            logs.clone().into(),
        ];
        assert_eq!(0, lifecycle.start(&mut app, args));
        assert_eq!(Some(json!({"from": "cli"})), app.config);
        assert_eq!(Source::CliArg, lifecycle.config_path().unwrap().source);
        assert!(lifecycle.logfile().unwrap().starts_with(&logs));
    }

    #[test]
    fn typed_config() {
        #[derive(Debug, Deserialize)]
        struct Cfg {
            example_parameter_integer: i64,
            example_parameter_string: String,
        }

        #[derive(Debug, Deserialize)]
        struct Wrong {
            #[allow(dead_code)]
            example_parameter_string: u8,
        }

        let env = Env::new();
        let mut lifecycle = Lifecycle::new(env.with_config());
        assert_eq!(0, lifecycle.start(&mut TestApp::ok(), Vec::<OsString>::new()));
        let cfg: Cfg = lifecycle.config_as().unwrap();
        assert_eq!(42, cfg.example_parameter_integer);
        assert_eq!("foo", cfg.example_parameter_string);
        let err = lifecycle.config_as::<Wrong>().unwrap_err();
        assert!(err.to_string().contains("example_parameter_string"), "{}", err);
    }

    #[test]
    fn version_skips_everything() {
        let env = Env::new();
        let mut lifecycle = Lifecycle::new(env.descriptor());
        let mut app = TestApp::ok();
        assert_eq!(0, lifecycle.start(&mut app, vec!["--version"]));
        assert!(!app.ran);
        assert!(lifecycle.logfile().is_none());
    }

    #[test]
    fn start_only_once() {
        let env = Env::new();
        let mut lifecycle = Lifecycle::new(env.descriptor().config_init(false));
        let mut app = TestApp::ok();
        assert_eq!(0, lifecycle.start(&mut app, Vec::<OsString>::new()));
        app.ran = false;
        assert_eq!(-1, lifecycle.start(&mut app, Vec::<OsString>::new()));
        assert!(!app.ran);
        assert_eq!(State::Succeeded, lifecycle.state());
    }

    #[test]
    fn logging_untouched_when_disabled() {
        let env = Env::new();
        let descriptor = env
            .descriptor()
            .config_init(false)
            .custom_logging(false)
            .default_logging(false);
        let mut lifecycle = Lifecycle::new(descriptor);
        assert_eq!(0, lifecycle.start(&mut TestApp::ok(), Vec::<OsString>::new()));
        assert!(lifecycle.logging_mode().is_none());
        assert!(lifecycle.logfile().is_none());
    }

    #[test]
    fn default_logging_without_custom_config() {
        let env = Env::new();
        // Custom logging is on, but there's no document to find
        let descriptor = env.descriptor().config_init(false).default_logging(false);
        let mut lifecycle = Lifecycle::new(descriptor);
        assert_eq!(0, lifecycle.start(&mut TestApp::ok(), Vec::<OsString>::new()));
        assert!(lifecycle.logging_config_path().is_none());
        assert_eq!(Some(LoggingMode::Default), lifecycle.logging_mode());
        assert!(has_line(&log_content(&lifecycle), "ERROR"));
    }

    #[test]
    fn command_line_logging_config_wins() {
        let env = Env::new();
        let explicit = env.write("explicit_logging.yaml", "root:\n  handlers: [missing]\n");
        let cli = env.write(
            "cli_logging.yaml",
            r#"
formatters:
  cli:
    format: "CLI {level} {message}"
handlers:
  file:
    class: file
    formatter: cli
    filename: cli.log
root:
  level: INFO
  handlers: [file]
"#,
        );
        let descriptor = env.descriptor().config_init(false).logging_config_path(&explicit);
        let mut lifecycle = Lifecycle::new(descriptor);
        let args = vec![OsString::from("--logging-config"), cli.into()];
        assert_eq!(0, lifecycle.start(&mut TestApp::ok(), args));
        assert_eq!(Some(LoggingMode::Custom), lifecycle.logging_mode());
        let resolved = lifecycle.logging_config_path().unwrap();
        assert_eq!(Source::CliArg, resolved.source);
        assert!(resolved.path.ends_with("cli_logging.yaml"));
        assert!(log_content(&lifecycle).contains("CLI WARN test log line"));
    }
}
