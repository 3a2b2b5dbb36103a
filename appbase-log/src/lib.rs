#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Declarative logging set up for [`appbase`](https://crates.io/crates/appbase) applications.
//!
//! The logging is described by a YAML (or JSON) document with four sections:
//!
//! ```yaml
//! formatters:
//!   plain:
//!     format: "{time} [{level}][{target}]: {message}"
//!     datefmt: "%Y-%m-%d %H:%M:%S"
//! handlers:
//!   console:
//!     class: stderr
//!     level: INFO
//!     formatter: plain
//!   logfile:
//!     class: file
//!     level: DEBUG
//!     formatter: plain
//!     filename: /var/log/my-app.log
//! loggers:
//!   my_app::noisy:
//!     level: WARN
//! root:
//!   level: DEBUG
//!   handlers: [console, logfile]
//! ```
//!
//! The document is loaded into an owned [`LoggingConfig`], possibly adjusted (all levels forced
//! to a single one, all file handlers pointed to a single file) and then [applied]. Applying
//! replaces whatever logger was installed before. Nothing is merged or stacked.
//!
//! Levels are the usual `OFF`, `ERROR`, `WARN`, `INFO`, `DEBUG` and `TRACE`. `WARNING`,
//! `CRITICAL` and `FATAL` are understood too.
//!
//! Sections and keys not listed above are kept in the document untouched. They are only
//! reported on the debug level when the document is applied.
//!
//! [applied]: LoggingConfig::apply

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Once};

use fern::Dispatch;
use itertools::Itertools;
use log::{debug, trace, LevelFilter};
use serde::de::{Deserializer, Error as DeError};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

mod template;

use crate::template::Template;

const DEFAULT_FORMAT: &str = "{time} [{level}][{target}]: {message}";
const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// The name of the formatter in the [builtin][LoggingConfig::builtin] configuration.
pub const BUILTIN_FORMATTER: &str = "default";

const BUILTIN_CONFIG: &str = r#"
formatters:
  default:
    format: "{time} [{level}][{target}]: {message}"
    datefmt: "%Y-%m-%d %H:%M:%S%.3f"
handlers:
  console:
    class: stderr
    level: INFO
    formatter: default
  logfile:
    class: file
    level: DEBUG
    formatter: default
    filename: application.log
root:
  level: INFO
  handlers: [console, logfile]
"#;

/// Errors from loading and applying the logging configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration file can't be read.
    #[error("Can't read logging config {path:?}")]
    Read {
        /// The file that was asked for.
        path: PathBuf,
        /// What went wrong.
        #[source]
        source: io::Error,
    },

    /// The document is not a valid YAML.
    #[error("Logging config is not a valid YAML document")]
    Parse(#[from] serde_yaml::Error),

    /// The top level of the document is something else than a mapping of sections.
    #[error("Logging config must be a mapping of sections")]
    NotAMapping,

    /// Some section doesn't have the expected shape.
    #[error("Logging config has invalid structure")]
    Structure(#[source] serde_yaml::Error),

    /// A handler refers to a formatter that is not defined.
    #[error("Handler {handler} refers to unknown formatter {formatter}")]
    UnknownFormatter {
        /// The referring handler.
        handler: String,
        /// The missing formatter.
        formatter: String,
    },

    /// A logger (or the root) refers to a handler that is not defined.
    #[error("Logger {logger} refers to unknown handler {handler}")]
    UnknownHandler {
        /// The referring logger.
        logger: String,
        /// The missing handler.
        handler: String,
    },

    /// A file handler has nowhere to write to.
    #[error("File handler {0} has no filename")]
    MissingFilename(String),

    /// A format template can't be parsed.
    #[error("Invalid log format {format:?}: {reason}")]
    Format {
        /// The template.
        format: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A date format has unknown specifiers.
    #[error("Invalid date format {0:?}")]
    DateFormat(String),

    /// A log file can't be opened for writing.
    #[error("Can't open log file {path:?}")]
    Open {
        /// The log file.
        path: PathBuf,
        /// What went wrong.
        #[source]
        source: io::Error,
    },
}

const LEVEL_NAMES: &[&str] = &[
    "OFF", "CRITICAL", "FATAL", "ERROR", "WARNING", "WARN", "INFO", "DEBUG", "TRACE",
];

fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.to_ascii_uppercase().as_str() {
        "CRITICAL" | "FATAL" => Some(LevelFilter::Error),
        "WARNING" => Some(LevelFilter::Warn),
        other => other.parse().ok(),
    }
}

fn deserialize_level_filter<'de, D: Deserializer<'de>>(d: D) -> Result<LevelFilter, D::Error> {
    let s = String::deserialize(d)?;
    parse_level(&s).ok_or_else(|| D::Error::unknown_variant(&s, LEVEL_NAMES))
}

fn deserialize_opt_level_filter<'de, D>(d: D) -> Result<Option<LevelFilter>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_level_filter(d).map(Some)
}

fn default_level_filter() -> LevelFilter {
    LevelFilter::Trace
}

fn default_root_level() -> LevelFilter {
    LevelFilter::Warn
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_owned()
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_owned()
}

fn default_propagate() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct Formatter {
    #[serde(default = "default_format")]
    format: String,
    #[serde(default = "default_date_format")]
    datefmt: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "class", rename_all = "kebab-case")]
enum Destination {
    File {
        #[serde(default)]
        filename: Option<PathBuf>,
    },
    Stdout,
    Stderr,
}

#[derive(Debug, Deserialize)]
struct Handler {
    #[serde(flatten)]
    destination: Destination,
    #[serde(
        default = "default_level_filter",
        deserialize_with = "deserialize_level_filter"
    )]
    level: LevelFilter,
    #[serde(default)]
    formatter: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Logger {
    #[serde(default, deserialize_with = "deserialize_opt_level_filter")]
    level: Option<LevelFilter>,
    #[serde(default)]
    handlers: Vec<String>,
    #[serde(default = "default_propagate")]
    propagate: bool,
}

#[derive(Debug, Deserialize)]
struct Root {
    #[serde(default = "default_root_level", deserialize_with = "deserialize_level_filter")]
    level: LevelFilter,
    #[serde(default)]
    handlers: Vec<String>,
}

impl Default for Root {
    fn default() -> Self {
        Root {
            level: default_root_level(),
            handlers: Vec::new(),
        }
    }
}

/// The typed view of the document, as far as it is understood.
#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    formatters: BTreeMap<String, Formatter>,
    #[serde(default)]
    handlers: BTreeMap<String, Handler>,
    #[serde(default)]
    loggers: BTreeMap<String, Logger>,
    #[serde(default)]
    root: Root,
}

/// Decides which handlers get records of which targets.
///
/// Loggers are ordered from the most specific (longest name) so the first match is the closest
/// one.
#[derive(Debug)]
struct Routing {
    loggers: Vec<(String, Vec<String>, bool)>,
    root: Vec<String>,
}

fn target_matches(logger: &str, target: &str) -> bool {
    target == logger
        || (target.starts_with(logger) && target[logger.len()..].starts_with("::"))
}

impl Routing {
    fn new(doc: &Document) -> Self {
        let loggers = doc
            .loggers
            .iter()
            .map(|(name, logger)| (name.clone(), logger.handlers.clone(), logger.propagate))
            .sorted_by(|(a, ..), (b, ..)| b.len().cmp(&a.len()))
            .collect();
        Routing {
            loggers,
            root: doc.root.handlers.clone(),
        }
    }

    fn accepts(&self, handler: &str, target: &str) -> bool {
        let matching = self
            .loggers
            .iter()
            .filter(|(name, ..)| target_matches(name, target));
        for (_, handlers, propagate) in matching {
            if handlers.iter().any(|h| h == handler) {
                return true;
            }
            if !propagate {
                return false;
            }
        }
        self.root.iter().any(|h| h == handler)
    }
}

impl Document {
    fn check_references(&self) -> Result<(), Error> {
        let references = self
            .loggers
            .iter()
            .flat_map(|(name, logger)| logger.handlers.iter().map(move |h| (name.as_str(), h)))
            .chain(self.root.handlers.iter().map(|h| ("root", h)));
        for (logger, handler) in references {
            if !self.handlers.contains_key(handler) {
                return Err(Error::UnknownHandler {
                    logger: logger.to_owned(),
                    handler: handler.clone(),
                });
            }
        }
        Ok(())
    }

    fn handler(&self, name: &str, handler: &Handler, routing: &Arc<Routing>) -> Result<Dispatch, Error> {
        trace!("Creating log handler {}", name);
        let template = match handler.formatter.as_ref() {
            Some(formatter) => {
                let formatter =
                    self.formatters
                        .get(formatter)
                        .ok_or_else(|| Error::UnknownFormatter {
                            handler: name.to_owned(),
                            formatter: formatter.clone(),
                        })?;
                Template::parse(&formatter.format, &formatter.datefmt)?
            }
            None => Template::parse(DEFAULT_FORMAT, DEFAULT_DATE_FORMAT)?,
        };
        let routing = Arc::clone(routing);
        let handler_name = name.to_owned();
        let dispatch = Dispatch::new()
            .level(handler.level)
            .filter(move |metadata| routing.accepts(&handler_name, metadata.target()))
            .format(move |out, message, record| out.finish(format_args!("{}", template.render(message, record))));
        match &handler.destination {
            Destination::File { filename: Some(filename) } => {
                let file = fern::log_file(filename).map_err(|source| Error::Open {
                    path: filename.clone(),
                    source,
                })?;
                Ok(dispatch.chain(file))
            }
            Destination::File { filename: None } => Err(Error::MissingFilename(name.to_owned())),
            Destination::Stdout => Ok(dispatch.chain(io::stdout())),
            Destination::Stderr => Ok(dispatch.chain(io::stderr())),
        }
    }

    fn create(&self) -> Result<Dispatch, Error> {
        debug!("Creating loggers");
        self.check_references()?;
        let routing = Arc::new(Routing::new(self));
        let top = self
            .loggers
            .iter()
            .filter_map(|(name, logger)| logger.level.map(|level| (name, level)))
            .fold(Dispatch::new().level(self.root.level), |top, (name, level)| {
                top.level_for(name.clone(), level)
            });
        self.handlers
            .iter()
            .map(|(name, handler)| self.handler(name, handler, &routing))
            .fold_ok(top, Dispatch::chain)
    }
}

/// An owned logging configuration document.
///
/// This is the single object describing the whole logging of the process. It is created from a
/// file, a string or the [builtin] default, optionally tweaked and then consumed by
/// [`apply`][LoggingConfig::apply].
///
/// [builtin]: LoggingConfig::builtin
#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    document: Mapping,
}

impl LoggingConfig {
    /// Loads the document from a file.
    ///
    /// The file is read whole and closed before being parsed.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        trace!("Loading logging config {:?}", path);
        let content = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_owned(),
            source,
        })?;
        content.parse()
    }

    /// The default configuration, used when the application brings none of its own.
    ///
    /// It logs `INFO` and above both to stderr and to `application.log`. The file is expected to
    /// be [redirected][LoggingConfig::redirect_files] somewhere more sensible.
    pub fn builtin() -> Self {
        BUILTIN_CONFIG
            .parse()
            .expect("The builtin logging config is broken")
    }

    /// Access to the (possibly adjusted) document.
    pub fn document(&self) -> &Mapping {
        &self.document
    }

    fn section_entries(&mut self, section: &str) -> impl Iterator<Item = &mut Mapping> {
        self.document
            .get_mut(section)
            .and_then(Value::as_mapping_mut)
            .into_iter()
            .flat_map(|entries| entries.iter_mut())
            .filter_map(|(_, entry)| entry.as_mapping_mut())
    }

    /// Overwrites the level of every handler, every named logger and the root.
    ///
    /// This is a blanket override. It doesn't matter if the original level was more or less
    /// verbose.
    pub fn force_level(&mut self, level: LevelFilter) {
        let level = Value::String(level.to_string());
        for section in &["handlers", "loggers"] {
            for entry in self.section_entries(section) {
                entry.insert(Value::from("level"), level.clone());
            }
        }
        if let Some(root) = self.document.get_mut("root").and_then(Value::as_mapping_mut) {
            root.insert(Value::from("level"), level);
        }
    }

    /// Points all the file handlers to the given file.
    ///
    /// Handlers of other classes are left alone.
    pub fn redirect_files(&mut self, path: &Path) {
        let filename = Value::String(path.to_string_lossy().into_owned());
        let class = Value::from("class");
        for entry in self.section_entries("handlers") {
            if entry.get(&class).and_then(Value::as_str) == Some("file") {
                entry.insert(Value::from("filename"), filename.clone());
            }
        }
    }

    /// Replaces the line and date format of the [builtin][LoggingConfig::builtin] formatter.
    ///
    /// Does nothing if the document has no formatter of that name.
    pub fn set_default_format(&mut self, format: Option<&str>, datefmt: Option<&str>) {
        let formatter = self
            .document
            .get_mut("formatters")
            .and_then(|f| f.get_mut(BUILTIN_FORMATTER))
            .and_then(Value::as_mapping_mut);
        if let Some(formatter) = formatter {
            if let Some(format) = format {
                formatter.insert(Value::from("format"), Value::from(format));
            }
            if let Some(datefmt) = datefmt {
                formatter.insert(Value::from("datefmt"), Value::from(datefmt));
            }
        }
    }

    fn decode(&self) -> Result<Document, Error> {
        let value = Value::Mapping(self.document.clone());
        serde_ignored::deserialize(value, |path| {
            debug!("Ignoring unknown logging config key {}", path)
        })
        .map_err(Error::Structure)
    }

    /// Checks the configuration and builds the logger out of it, without installing it.
    ///
    /// This opens all the log files.
    pub fn build(&self) -> Result<(LevelFilter, Box<dyn log::Log>), Error> {
        Ok(self.decode()?.create()?.into_log())
    }

    /// Installs this configuration as the process-wide logger.
    ///
    /// The whole logger is built first. If that fails, the previously installed logger stays in
    /// place. Otherwise it fully replaces the previous one.
    pub fn apply(self) -> Result<(), Error> {
        install(self.build()?);
        Ok(())
    }
}

impl FromStr for LoggingConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match serde_yaml::from_str(s)? {
            Value::Mapping(document) => Ok(LoggingConfig { document }),
            _ => Err(Error::NotAMapping),
        }
    }
}

static INIT: Once = Once::new();

fn install((max_log_level, top_logger): (LevelFilter, Box<dyn log::Log>)) {
    INIT.call_once(|| {
        // Someone else might have set a logger already, we just have no power over it then.
        let _ = log_reroute::init();
        log_panics::init();
    });
    debug!("Installing loggers");
    log_reroute::reroute_boxed(top_logger);
    log::set_max_level(max_log_level);
}

/// Installs a bare logger writing warnings and errors to stderr.
///
/// This is the last resort when not even the [builtin][LoggingConfig::builtin] configuration
/// can be applied (usually because the log file can't be opened).
pub fn install_fallback() {
    let logger = Dispatch::new()
        .level(LevelFilter::Warn)
        .format(|out, message, record| {
            out.finish(format_args!("[{}][{}]: {}", record.level(), record.target(), message))
        })
        .chain(io::stderr())
        .into_log();
    install(logger);
}

/// Loads, adjusts and applies a logging configuration file in one go.
///
/// * `logfile`: if set, all file handlers are [redirected][LoggingConfig::redirect_files] there.
/// * `level`: if set, all levels are [forced][LoggingConfig::force_level] to it.
pub fn initialize(
    config: &Path,
    logfile: Option<&Path>,
    level: Option<LevelFilter>,
) -> Result<(), Error> {
    let mut cfg = LoggingConfig::from_file(config)?;
    if let Some(level) = level {
        cfg.force_level(level);
    }
    if let Some(logfile) = logfile {
        cfg.redirect_files(logfile);
    }
    cfg.apply()
}
