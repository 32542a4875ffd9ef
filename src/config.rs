//! Startup configuration: CLI flags plus the `options.txt` sidecar next to
//! the archive.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "travel-graph-store", about = "In-memory travel data store")]
pub struct Config {
    /// TCP port to listen on.
    #[arg(long = "port", default_value_t = 80)]
    pub port: u16,

    /// Path to the ZIP archive to load at startup.
    #[arg(long = "zip", default_value = "/tmp/data/data.zip")]
    pub zip: PathBuf,

    /// Accepted for compatibility with the original CLI; profiling hooks
    /// are external plumbing and this flag is a no-op here.
    #[arg(long = "pprof", default_value_t = false)]
    pub pprof: bool,
}

impl Config {
    /// Path to the optional `options.txt` sidecar, sitting next to the
    /// archive.
    pub fn options_path(&self) -> Option<PathBuf> {
        self.zip.parent().map(|dir| dir.join("options.txt"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_port_80_and_default_archive_path() {
        let config = Config::parse_from(["travel-graph-store"]);
        assert_eq!(config.port, 80);
        assert_eq!(config.zip, PathBuf::from("/tmp/data/data.zip"));
        assert!(!config.pprof);
    }

    #[test]
    fn options_path_sits_beside_archive() {
        let config = Config::parse_from(["travel-graph-store", "--zip", "/srv/data/data.zip"]);
        assert_eq!(config.options_path(), Some(PathBuf::from("/srv/data/options.txt")));
    }
}
