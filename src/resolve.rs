//! Finding the configuration files.
//!
//! Both the logging configuration and the application configuration are looked for the same way.
//! A path given on the command line wins, a path given explicitly by the application comes
//! second and only if neither is set the search directories are scanned for the candidate
//! filenames.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use log::trace;
use serde::Serialize;

/// Where a resolved path came from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    /// Passed on the command line.
    CliArg,
    /// Set by the application in its [`Descriptor`][crate::Descriptor].
    Explicit,
    /// Found by scanning the search directories.
    Search,
}

impl Display for Source {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        let name = match self {
            Source::CliArg => "command line",
            Source::Explicit => "explicit",
            Source::Search => "search",
        };
        write!(fmt, "{}", name)
    }
}

/// A path together with the way it was found.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct Resolved {
    /// The path.
    pub path: PathBuf,
    /// How it was found.
    pub source: Source,
}

/// Returns the first `dir/name` that exists.
///
/// The directories are tried in order and in each of them all the names are tried in order
/// before moving to the next directory.
pub fn find_file<D, N>(dirs: &[D], names: &[N]) -> Option<PathBuf>
where
    D: AsRef<Path>,
    N: AsRef<Path>,
{
    dirs.iter()
        .flat_map(|dir| names.iter().map(move |name| dir.as_ref().join(name)))
        .inspect(|candidate| trace!("Looking for {}", candidate.display()))
        .find(|candidate| candidate.exists())
}

/// The inputs of one path resolution.
#[derive(Clone, Debug, Default)]
pub struct Lookup<'a> {
    /// The path from the command line, if any.
    pub cli: Option<&'a Path>,
    /// The path set by the application, if any.
    pub explicit: Option<&'a Path>,
    /// Directories to search.
    pub dirs: &'a [PathBuf],
    /// Filenames to look for in each of the directories.
    pub names: &'a [String],
}

impl Lookup<'_> {
    /// Picks the path by the precedence.
    ///
    /// Note that the command line and explicit paths are taken as they are, without checking they
    /// exist. Only the search looks at the file system.
    pub fn resolve(&self) -> Option<Resolved> {
        let resolved = |path: &Path, source| Resolved {
            path: path.to_owned(),
            source,
        };
        self.cli
            .map(|path| resolved(path, Source::CliArg))
            .or_else(|| self.explicit.map(|path| resolved(path, Source::Explicit)))
            .or_else(|| {
                find_file(self.dirs, self.names).map(|path| Resolved {
                    path,
                    source: Source::Search,
                })
            })
    }
}
