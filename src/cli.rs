use clap::Parser;
use flate2::Compression;

#[derive(Parser, Debug)]
#[command(name = "rgz")]
#[command(version)]
#[command(about = "A Rust gzip utility with HTTP URL listing support", long_about = None)]
#[command(after_help = "Examples:\n  \
  rgz notes.txt                  compress notes.txt to notes.txt.gz\n  \
  rgz -dc logs.gz | more         decompress logs.gz to stdout\n  \
  rgz -l https://example.com/data.gz   list a remote file using Range requests")]
pub struct Cli {
    /// Files to process; none or "-" means stdin to stdout
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// Decompress
    #[arg(short = 'd', long = "decompress")]
    pub decompress: bool,

    /// Write to stdout, keep input files
    #[arg(short = 'c', long = "stdout")]
    pub stdout: bool,

    /// Keep input files
    #[arg(short = 'k', long = "keep")]
    pub keep: bool,

    /// Overwrite existing output files
    #[arg(short = 'f', long = "force")]
    pub force: bool,

    /// List compressed files (local paths or HTTP URLs)
    #[arg(short = 'l', long = "list")]
    pub list: bool,

    /// Test compressed file integrity
    #[arg(short = 't', long = "test")]
    pub test: bool,

    /// Do not save or restore the original name and timestamp
    #[arg(short = 'n', long = "no-name")]
    pub no_name: bool,

    /// Restore the original name from the header when decompressing
    #[arg(short = 'N', long = "name", overrides_with = "no_name")]
    pub name: bool,

    /// Store a header checksum when compressing
    #[arg(long = "header-crc")]
    pub header_crc: bool,

    /// Comment to store in the header when compressing
    #[arg(short = 'C', long = "comment", value_name = "TEXT")]
    pub comment: Option<String>,

    /// Suffix for compressed files
    #[arg(short = 'S', long = "suffix", value_name = "SUF", default_value = ".gz")]
    pub suffix: String,

    /// Compression level (0-9)
    #[arg(short = 'L', long = "level", value_name = "N",
          value_parser = clap::value_parser!(u32).range(0..=9))]
    pub level: Option<u32>,

    /// Compress faster (level 1)
    #[arg(long = "fast", conflicts_with_all = ["best", "level"])]
    pub fast: bool,

    /// Compress better (level 9)
    #[arg(long = "best", conflicts_with = "level")]
    pub best: bool,

    /// Verbose output (-vv => debug logging)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode, suppress warnings
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Cli {
    pub fn is_http_url(file: &str) -> bool {
        file.starts_with("http://") || file.starts_with("https://")
    }

    pub fn is_stdio(file: &str) -> bool {
        file == "-"
    }

    pub fn compression(&self) -> Compression {
        if self.fast {
            Compression::fast()
        } else if self.best {
            Compression::best()
        } else {
            self.level.map(Compression::new).unwrap_or_default()
        }
    }

    /// Default log filter for the requested verbosity
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "info",
            _ => "debug",
        }
    }

    pub fn keeps_input(&self) -> bool {
        self.keep || self.stdout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_flags() {
        let cli = Cli::parse_from(["rgz", "--best", "a"]);
        assert_eq!(cli.compression(), Compression::best());

        let cli = Cli::parse_from(["rgz", "-L", "3", "a"]);
        assert_eq!(cli.compression(), Compression::new(3));

        let cli = Cli::parse_from(["rgz", "a"]);
        assert_eq!(cli.compression(), Compression::default());

        assert!(Cli::try_parse_from(["rgz", "-L", "12", "a"]).is_err());
        assert!(Cli::try_parse_from(["rgz", "--fast", "--best"]).is_err());
    }

    #[test]
    fn stdout_keeps_input() {
        let cli = Cli::parse_from(["rgz", "-dc", "x.gz"]);
        assert!(cli.decompress && cli.keeps_input());
        assert_eq!(cli.suffix, ".gz");
    }

    #[test]
    fn url_detection() {
        assert!(Cli::is_http_url("https://example.com/a.gz"));
        assert!(!Cli::is_http_url("a.gz"));
    }
}
