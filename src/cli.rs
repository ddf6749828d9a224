//! Command-line interface definitions / 命令行参数

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Browse S3-compatible object storage as a file system
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_TIME"), ")"),
    about,
    long_about = None
)]
pub struct Args {
    /// Host configuration file (default: ./objfs.json)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List buckets with region and creation date
    Buckets,
    /// List a directory
    Ls {
        #[arg(default_value = ".")]
        path: String,
    },
    /// Print the tree under a directory
    Tree {
        #[arg(default_value = ".")]
        path: String,
        /// Maximum depth below PATH
        #[arg(short, long, default_value_t = usize::MAX)]
        depth: usize,
    },
    /// Show attributes of a path
    Stat { path: String },
    /// Write an object to stdout
    Cat { path: String },
    /// Upload a local file, replacing the object
    Put {
        #[arg(value_name = "LOCAL")]
        local: PathBuf,
        path: String,
    },
    /// Create a directory (kept for this session only)
    Mkdir { path: String },
    /// Delete an object
    Rm { path: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let args = Args::try_parse_from(["objfs", "-c", "host.json", "ls", "/bucket-0"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("host.json")));
        assert!(matches!(args.command, Command::Ls { path } if path == "/bucket-0"));

        let args = Args::try_parse_from(["objfs", "tree", "--depth", "2"]).unwrap();
        assert!(matches!(args.command, Command::Tree { path, depth: 2 } if path == "."));

        let args = Args::try_parse_from(["objfs", "put", "a.txt", "/bucket-0/a.txt"]).unwrap();
        assert!(matches!(args.command, Command::Put { .. }));

        assert!(Args::try_parse_from(["objfs", "cat"]).is_err());
    }
}
