//! A hello-world application.
//!
//! It greets someone a number of times. The greeting comes from the configuration, who to greet
//! from the command line.
//!
//! Try it out with different options:
//!
//! ```sh
//! cargo run --example hello -- --name Alice
//! cargo run --example hello -- -vv --times 3
//! cargo run --example hello -- --config /somewhere/else.json
//! cargo run --example hello -- --logging-dir /tmp/hello-logs
//! ```
//!
//! The log file is created in the current directory unless told otherwise. Place a `logging.yaml`
//! into the current directory to take over the logging.

use std::process;

use appbase::prelude::*;
use log::{debug, info};
use serde::Deserialize;
use structopt::clap::{App, ArgMatches};
use structopt::{StructOpt, StructOptInternal};

/// The application's own command line options.
#[derive(Debug, StructOpt)]
struct Opts {
    /// Who to greet.
    #[structopt(long, default_value = "world")]
    name: String,

    /// How many times. Overrides the configuration.
    #[structopt(long)]
    times: Option<u32>,
}

/// The configuration, as checked by `hello.schema.json`.
#[derive(Debug, Deserialize)]
struct Config {
    greeting: String,
    times: u32,
}

struct Hello;

impl Application for Hello {
    fn add_arguments<'a, 'b>(&mut self, app: App<'a, 'b>) -> Result<App<'a, 'b>, AnyError> {
        Ok(Opts::augment_clap(app.about("Greets people")))
    }

    fn run(&mut self, base: &Lifecycle, matches: &ArgMatches) -> Result<Option<i32>, AnyError> {
        let opts = Opts::from_clap(matches);
        let cfg: Config = base.config_as()?;
        debug!(target: base.name(), "Running with {:?} and {:?}", opts, cfg);
        let times = opts.times.unwrap_or(cfg.times);
        if times == 0 {
            // Not greeting anyone is a valid, but a bit sad, outcome
            return Err(Exit(Some(2)).into());
        }
        for _ in 0..times {
            info!(target: base.name(), "{}, {}!", cfg.greeting, opts.name);
        }
        Ok(None)
    }
}

fn main() {
    let demos = concat!(env!("CARGO_MANIFEST_DIR"), "/demos");
    let descriptor = Descriptor::new("hello", env!("CARGO_PKG_VERSION"))
        .config_schema_path(format!("{}/hello.schema.json", demos))
        .config_search_paths(vec![".", demos])
        .logging_default_format("{time} {level} {target}: {message}");
    let mut lifecycle = Lifecycle::new(descriptor);
    process::exit(lifecycle.start_env(&mut Hello));
}
