//! Configuration loading.
//!
//! The application configuration is a single JSON document, optionally checked against a JSON
//! Schema. The schema is used for validation only. Nothing is defaulted or coerced, the document
//! is returned exactly as it was read.
//!
//! The [`Lifecycle`][crate::Lifecycle] finds the files and calls [`load`] on its own. If you don't
//! want the whole machinery, this module can be used directly.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use appbase::cfg_loader;
//!
//! let cfg = cfg_loader::load(Path::new("app.json"), Some(Path::new("app.schema.json")))?;
//! println!("{}", cfg["message"]);
//! # Ok::<(), appbase::ConfigError>(())
//! ```

use std::fs;
use std::io::Error as IoError;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use log::{debug, trace};
use serde_json::Value;

/// Problems with the application configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration file can't be read.
    #[error("Config file {} can't be read", .path.display())]
    FileNotFound {
        /// The configuration file.
        path: PathBuf,
        /// The reason.
        #[source]
        source: IoError,
    },

    /// The configuration file is not a JSON document.
    #[error("Config file {} is not a valid JSON", .path.display())]
    Malformed {
        /// The configuration file.
        path: PathBuf,
        /// The parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The schema file can't be read.
    #[error("Schema file {} can't be read", .path.display())]
    SchemaFileNotFound {
        /// The schema file.
        path: PathBuf,
        /// The reason.
        #[source]
        source: IoError,
    },

    /// The schema itself is broken.
    ///
    /// Either it is not a JSON at all or it is not a valid schema. This doesn't depend on the
    /// configuration document in any way.
    #[error("Schema {} is invalid: {reason}", .path.display())]
    SchemaInvalid {
        /// The schema file.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// The document doesn't satisfy the schema.
    #[error(
        "Config file {} doesn't match schema {}: {}",
        .path.display(),
        .schema.display(),
        .errors.join("; ")
    )]
    Invalid {
        /// The configuration file.
        path: PathBuf,
        /// The schema it was checked against.
        schema: PathBuf,
        /// All the violations found.
        errors: Vec<String>,
    },

    /// No configuration file was given and none was found by searching.
    #[error("No config file named any of {names:?} found in any of {dirs:?}")]
    NotDiscovered {
        /// The directories searched.
        dirs: Vec<PathBuf>,
        /// The filenames looked for.
        names: Vec<String>,
    },
}

fn read_json<F>(path: &Path, not_found: F) -> Result<Result<Value, serde_json::Error>, ConfigError>
where
    F: FnOnce(PathBuf, IoError) -> ConfigError,
{
    trace!("Reading {}", path.display());
    let content = fs::read_to_string(path).map_err(|e| not_found(path.to_owned(), e))?;
    Ok(serde_json::from_str(&content))
}

/// Loads a JSON configuration and validates it against a schema.
///
/// The steps are done in this order, the first failure is returned:
///
/// 1. Reading the configuration ([`FileNotFound`][ConfigError::FileNotFound],
///    [`Malformed`][ConfigError::Malformed]).
/// 2. Reading the schema, if any ([`SchemaFileNotFound`][ConfigError::SchemaFileNotFound]).
/// 3. Compiling the schema ([`SchemaInvalid`][ConfigError::SchemaInvalid]).
/// 4. Validating ([`Invalid`][ConfigError::Invalid], with all the violations).
pub fn load(config: &Path, schema: Option<&Path>) -> Result<Value, ConfigError> {
    let document = read_json(config, |path, source| ConfigError::FileNotFound { path, source })?
        .map_err(|source| ConfigError::Malformed {
            path: config.to_owned(),
            source,
        })?;

    let schema_path = match schema {
        Some(path) => path,
        None => {
            debug!("Loaded config {} without a schema", config.display());
            return Ok(document);
        }
    };
    let schema_invalid = |reason: String| ConfigError::SchemaInvalid {
        path: schema_path.to_owned(),
        reason,
    };
    let schema = read_json(schema_path, |path, source| ConfigError::SchemaFileNotFound {
        path,
        source,
    })?
    .map_err(|e| schema_invalid(e.to_string()))?;
    let compiled = JSONSchema::compile(&schema).map_err(|e| schema_invalid(e.to_string()))?;

    if let Err(violations) = compiled.validate(&document) {
        let errors = violations
            .map(|e| format!("{} (at '{}')", e, e.instance_path))
            .collect();
        return Err(ConfigError::Invalid {
            path: config.to_owned(),
            schema: schema_path.to_owned(),
            errors,
        });
    }
    debug!(
        "Loaded config {} validated by {}",
        config.display(),
        schema_path.display()
    );
    Ok(document)
}
