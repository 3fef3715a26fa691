//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Mimetree.
//
// Mimetree is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mimetree is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Mimetree. If not, see <http://www.gnu.org/licenses/>.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::file::Deserializers;
use log4rs::encode::pattern::PatternEncoder;
use structopt::StructOpt;

use mimetree::support::config::Config;
use mimetree::support::sysexits::*;
use mimetree::uri::ParseMode;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
struct Options {
    /// Read parser options from this TOML file.
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Configure logging from this log4rs TOML file instead of writing to
    /// standard error.
    #[structopt(long, parse(from_os_str))]
    log_config: Option<PathBuf>,

    /// Log more detail to standard error. Can be given up to three times.
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u32,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
enum Command {
    Parse(ParseSubcommand),
    Split(SplitSubcommand),
    Resolve(ResolveSubcommand),
    Escape(EscapeSubcommand),
    Normalize(NormalizeSubcommand),
}

/// Parse a message and describe its tree of parts.
///
/// Each line shows the content type, transfer encoding, number of header
/// fields and decoded body size of one part, indented by depth.
///
/// The message must use DOS line endings unless --fix-line-endings is
/// passed.
#[derive(StructOpt)]
pub(super) struct ParseSubcommand {
    /// Also print the header fields of each part.
    #[structopt(long)]
    pub(super) headers: bool,

    /// Print the re-encoded header block of the top-level message instead
    /// of the tree.
    #[structopt(long, conflicts_with = "headers")]
    pub(super) serialize: bool,

    /// If the first line of the input ends with a UNIX line ending, convert
    /// all line feeds to DOS line endings before parsing.
    #[structopt(long)]
    pub(super) fix_line_endings: bool,

    /// The file to parse. "-" reads from standard input.
    #[structopt(parse(from_os_str), default_value = "-")]
    pub(super) input: PathBuf,
}

/// Split an IRI reference into its components.
///
/// Exits with status 1 if the reference is not valid.
#[derive(StructOpt)]
pub(super) struct SplitSubcommand {
    /// One of iri-strict, uri-strict, iri-lenient, uri-lenient,
    /// iri-surrogate-lenient.
    #[structopt(long, default_value = "iri-strict")]
    pub(super) mode: ParseMode,

    pub(super) iri: String,
}

/// Resolve a reference against a base IRI.
///
/// If the base is not valid, the reference is printed unchanged. Exits with
/// status 1 if the reference itself is not valid.
#[derive(StructOpt)]
pub(super) struct ResolveSubcommand {
    /// One of iri-strict, uri-strict, iri-lenient, uri-lenient,
    /// iri-surrogate-lenient.
    #[structopt(long, default_value = "iri-strict")]
    pub(super) mode: ParseMode,

    pub(super) reference: String,

    pub(super) base: String,
}

/// Percent-encode characters which cannot appear in a URI or IRI.
#[derive(StructOpt)]
pub(super) struct EscapeSubcommand {
    /// 0 escapes everything not allowed in a URI; 1 escapes only non-ASCII
    /// characters, failing if the input is not a valid IRI; 2 escapes only
    /// non-ASCII characters; 3 is like 0 but also escapes a '%' which does
    /// not start a valid escape.
    #[structopt(long)]
    pub(super) mode: u32,

    pub(super) string: String,
}

/// Remove "." and ".." segments from a path.
#[derive(StructOpt)]
pub(super) struct NormalizeSubcommand {
    pub(super) path: String,
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let opts = Options::from_clap(&match Options::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        },
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        },
    });

    init_logging(opts.log_config.as_deref(), opts.verbose);
    let config = load_config(opts.config.as_deref());

    match opts.command {
        Command::Parse(cmd) => super::parse::parse(config, cmd),
        Command::Split(cmd) => super::iri::split(cmd),
        Command::Resolve(cmd) => super::iri::resolve(cmd),
        Command::Escape(cmd) => super::iri::escape(cmd),
        Command::Normalize(cmd) => super::iri::normalize(cmd),
    }
}

fn load_config(path: Option<&Path>) -> Config {
    let path = match path {
        Some(path) => path,
        None => return Config::default(),
    };

    let mut config_toml = Vec::new();
    if let Err(e) =
        fs::File::open(path).and_then(|mut f| f.read_to_end(&mut config_toml))
    {
        die!(EX_CONFIG, "Error reading '{}': {}", path.display(), e);
    }

    match toml::from_slice(&config_toml) {
        Ok(config) => config,
        Err(e) => die!(
            EX_CONFIG,
            "Error in config file at '{}': {}",
            path.display(),
            e
        ),
    }
}

fn init_logging(log_config: Option<&Path>, verbose: u32) {
    if let Some(path) = log_config {
        if let Err(e) = log4rs::init_file(path, Deserializers::new()) {
            die!(
                EX_CONFIG,
                "Error in logging config at '{}': {}",
                path.display(),
                e
            );
        }
        return;
    }

    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{l}: {m}{n}")))
        .build();
    let config = LogConfig::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level));

    match config {
        Ok(config) => {
            if let Err(e) = log4rs::init_config(config) {
                die!(EX_SOFTWARE, "Failed to initialise logging: {}", e);
            }
        },
        Err(e) => die!(EX_SOFTWARE, "Failed to initialise logging: {}", e),
    }
}
