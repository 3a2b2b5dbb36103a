//! The description of an application.
//!
//! The [`Descriptor`] holds everything the [`Lifecycle`][crate::Lifecycle] needs to know before
//! it starts: the name and version of the application, where to look for its logging and
//! application configuration and how to log by default.

use std::path::PathBuf;

use log::LevelFilter;
use serde::Serialize;

/// A configuration descriptor of the application.
///
/// Created by [`new`][Descriptor::new] and configured by the builder methods. The
/// [`Lifecycle`][crate::Lifecycle] takes it over and never changes it afterwards.
///
/// Unless configured otherwise:
///
/// * Both custom logging (from a configuration document) and default logging are enabled.
/// * The logging configuration is searched for as `logging.yaml`, `logging.yml`,
///   `<name>_logging.yaml` and `<name>_logging.yml`.
/// * The application configuration is required and it is searched for as `<name>_config.json`
///   and `.<name>_config.json`.
/// * Both are searched in the current directory and then in the home directory.
/// * The log file is `<timestamp>_<name>.log` in the current directory.
///
/// # Examples
///
/// ```rust
/// use appbase::{Descriptor, LevelFilter};
///
/// let descriptor = Descriptor::new("hello", "1.0.0")
///     .config_schema_path("/usr/share/hello/schema.json")
///     .force_log_level(LevelFilter::Info)
///     .logfile_dir("/var/log/hello");
/// assert_eq!("hello", descriptor.name());
/// ```
#[derive(Clone, Debug, Serialize)]
pub struct Descriptor {
    pub(crate) name: String,
    pub(crate) version: String,
    pub(crate) force_log_level: Option<LevelFilter>,
    pub(crate) custom_logging: bool,
    pub(crate) default_logging: bool,
    pub(crate) logging_config_path: Option<PathBuf>,
    pub(crate) logging_config_search_paths: Option<Vec<PathBuf>>,
    pub(crate) logging_config_search_filenames: Option<Vec<String>>,
    pub(crate) logging_default_format: Option<String>,
    pub(crate) logging_default_date_format: Option<String>,
    pub(crate) logfile_dir: Option<PathBuf>,
    pub(crate) logfile_name: Option<String>,
    pub(crate) config_init: bool,
    pub(crate) config_schema_path: Option<PathBuf>,
    pub(crate) config_path: Option<PathBuf>,
    pub(crate) config_search_paths: Option<Vec<PathBuf>>,
    pub(crate) config_search_filenames: Option<Vec<String>>,
}

impl Descriptor {
    /// Creates a descriptor with everything set to the defaults.
    pub fn new<N: Into<String>, V: Into<String>>(name: N, version: V) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            force_log_level: None,
            custom_logging: true,
            default_logging: true,
            logging_config_path: None,
            logging_config_search_paths: None,
            logging_config_search_filenames: None,
            logging_default_format: None,
            logging_default_date_format: None,
            logfile_dir: None,
            logfile_name: None,
            config_init: true,
            config_schema_path: None,
            config_path: None,
            config_search_paths: None,
            config_search_filenames: None,
        }
    }

    /// The name of the application.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The version of the application.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Forces all the log levels to the given one.
    ///
    /// The `--verbose` command line flag still takes precedence.
    pub fn force_log_level(self, level: LevelFilter) -> Self {
        Self {
            force_log_level: Some(level),
            ..self
        }
    }

    /// Enables or disables looking for the logging configuration document.
    pub fn custom_logging(self, enabled: bool) -> Self {
        Self {
            custom_logging: enabled,
            ..self
        }
    }

    /// Enables or disables the built-in logging configuration.
    ///
    /// If both this and [`custom_logging`][Descriptor::custom_logging] are disabled, the logger
    /// of the process is left alone.
    pub fn default_logging(self, enabled: bool) -> Self {
        Self {
            default_logging: enabled,
            ..self
        }
    }

    /// Sets the path to the logging configuration, instead of searching for it.
    pub fn logging_config_path<P: Into<PathBuf>>(self, path: P) -> Self {
        Self {
            logging_config_path: Some(path.into()),
            ..self
        }
    }

    /// Sets the directories searched for the logging configuration.
    ///
    /// This replaces the default ones.
    pub fn logging_config_search_paths<P, I>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths = paths.into_iter().map(Into::into).collect();
        Self {
            logging_config_search_paths: Some(paths),
            ..self
        }
    }

    /// Sets the filenames of the logging configuration to search for.
    ///
    /// This replaces the default ones.
    pub fn logging_config_search_filenames<N, I>(self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect();
        Self {
            logging_config_search_filenames: Some(names),
            ..self
        }
    }

    /// Changes the line format of the built-in logging.
    ///
    /// See [`appbase_log`] for the placeholders.
    pub fn logging_default_format<F: Into<String>>(self, format: F) -> Self {
        Self {
            logging_default_format: Some(format.into()),
            ..self
        }
    }

    /// Changes the date format (`strftime`-like) of the built-in logging.
    pub fn logging_default_date_format<F: Into<String>>(self, format: F) -> Self {
        Self {
            logging_default_date_format: Some(format.into()),
            ..self
        }
    }

    /// Sets the directory for the log file.
    ///
    /// The `--logging-dir` command line option takes precedence.
    pub fn logfile_dir<P: Into<PathBuf>>(self, dir: P) -> Self {
        Self {
            logfile_dir: Some(dir.into()),
            ..self
        }
    }

    /// Sets the name of the log file, instead of the timestamped one.
    pub fn logfile_name<N: Into<String>>(self, name: N) -> Self {
        Self {
            logfile_name: Some(name.into()),
            ..self
        }
    }

    /// Enables or disables loading of the application configuration.
    ///
    /// When enabled (the default), failing to find the configuration is an error.
    pub fn config_init(self, enabled: bool) -> Self {
        Self {
            config_init: enabled,
            ..self
        }
    }

    /// Sets the JSON Schema the application configuration is validated against.
    pub fn config_schema_path<P: Into<PathBuf>>(self, path: P) -> Self {
        Self {
            config_schema_path: Some(path.into()),
            ..self
        }
    }

    /// Sets the path to the application configuration, instead of searching for it.
    pub fn config_path<P: Into<PathBuf>>(self, path: P) -> Self {
        Self {
            config_path: Some(path.into()),
            ..self
        }
    }

    /// Sets the directories searched for the application configuration.
    pub fn config_search_paths<P, I>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths = paths.into_iter().map(Into::into).collect();
        Self {
            config_search_paths: Some(paths),
            ..self
        }
    }

    /// Sets the filenames of the application configuration to search for.
    pub fn config_search_filenames<N, I>(self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect();
        Self {
            config_search_filenames: Some(names),
            ..self
        }
    }

    pub(crate) fn default_config_filenames(&self) -> Vec<String> {
        vec![
            format!("{}_config.json", self.name),
            format!(".{}_config.json", self.name),
        ]
    }

    pub(crate) fn default_logging_filenames(&self) -> Vec<String> {
        vec![
            "logging.yaml".to_owned(),
            "logging.yml".to_owned(),
            format!("{}_logging.yaml", self.name),
            format!("{}_logging.yml", self.name),
        ]
    }
}
