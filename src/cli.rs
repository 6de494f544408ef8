use std::fs;
use std::path::{Component, Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Deserialize;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

#[derive(Parser)]
#[command(name = "afterarch")]
#[command(about = "Glue a zip archive onto the end of an executable and read it back")]
#[command(author, version, long_about = None)]
pub struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy a host file to OUTPUT and append an archive of PATHS to it
    Write {
        /// Where to write the bundled file
        output: PathBuf,

        /// Host file to copy, defaults to this executable
        #[arg(long, value_name = "FILE")]
        host: Option<PathBuf>,

        /// Files or directories to put in the archive
        paths: Vec<PathBuf>,
    },

    /// List the entries of the archive at the end of FILE
    List {
        /// Defaults to this executable
        file: Option<PathBuf>,
    },

    /// Print one entry to stdout
    Cat {
        file: PathBuf,
        entry: String,
    },

    /// Show where the archive sits inside FILE
    Info {
        /// Defaults to this executable
        file: Option<PathBuf>,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
}

// Configuration
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub follow_links: bool,
    pub same_fs: bool,
    pub compression: Compression,

    /// Overrides the permissions recorded for every entry
    pub unix_permissions: Option<u32>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Stored,
    Deflated,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            follow_links: true,
            same_fs: true,
            compression: Compression::Deflated,
            unix_permissions: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn entry_options(&self) -> SimpleFileOptions {
        let method = match self.compression {
            Compression::Stored => CompressionMethod::Stored,
            Compression::Deflated => CompressionMethod::Deflated,
        };
        let options = SimpleFileOptions::default().compression_method(method);

        match self.unix_permissions {
            Some(mode) => options.unix_permissions(mode),
            None => options,
        }
    }
}

/// Archive name for `path` found while walking `root`. The root's own name
/// is kept, so walking `docs` yields `docs/a.txt`.
pub fn entry_name(root: &Path, path: &Path) -> String {
    let base = root.parent().unwrap_or_else(|| Path::new(""));
    let rel = path.strip_prefix(base).unwrap_or(path);

    rel.components()
        .filter_map(|c| match c {
            Component::Normal(x) => Some(x.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether a walked `path` is the file being written. `output` must already
/// be canonical.
pub fn is_output(output: Option<&Path>, path: &Path) -> bool {
    output.is_some_and(|output| fs::canonicalize(path).is_ok_and(|p| p == output))
}
