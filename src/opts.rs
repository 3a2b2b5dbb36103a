use std::ffi::OsString;
use std::path::PathBuf;

use structopt::StructOpt;

/// The command line options every application gets.
#[derive(Clone, Debug, Default, StructOpt)]
pub(crate) struct CommonOpts {
    /// Log everything on the debug level (can be also written as -vv).
    #[structopt(long)]
    pub(crate) verbose: bool,

    /// Use this logging configuration file.
    #[structopt(long, parse(from_os_str = crate::utils::absolute_from_os_str))]
    pub(crate) logging_config: Option<PathBuf>,

    /// Put the log file into this directory.
    #[structopt(long, parse(from_os_str = crate::utils::absolute_from_os_str))]
    pub(crate) logging_dir: Option<PathBuf>,

    /// Use this application configuration file.
    #[structopt(short, long, parse(from_os_str = crate::utils::absolute_from_os_str))]
    pub(crate) config: Option<PathBuf>,
}

const VERBOSE_SHORT: &str = "-vv";
const VERBOSE_LONG: &str = "--verbose";

// Clap knows only single-letter short flags, so the two-letter one is turned into the long form
// before parsing.
pub(crate) fn normalize<I, T>(args: I) -> impl Iterator<Item = OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter().map(Into::into).map(|arg| {
        if arg == VERBOSE_SHORT {
            OsString::from(VERBOSE_LONG)
        } else {
            arg
        }
    })
}
