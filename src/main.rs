//! Main entry point for the rgz CLI application.
//!
//! Compresses, decompresses, tests and lists gzip files. Listing works on
//! local paths and HTTP URLs; the other modes stream local files or stdio.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::{error, info, warn};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rgz::gzip::latin1;
use rgz::{
    Cli, GzEntry, GzInspector, GzReader, GzWriter, Header, HttpRangeReader, LocalFileReader, Os,
    ReadAt,
};

/// Application entry point.
///
/// Parses command-line arguments, processes every operand and exits with
/// status 1 if any of them failed.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env = env_logger::Env::default().default_filter_or(cli.log_filter());
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .init();

    let files = if cli.files.is_empty() {
        vec!["-".to_string()]
    } else {
        cli.files.clone()
    };

    if cli.list {
        return list_files(&files, &cli).await;
    }

    let mut failures = 0usize;
    for file in &files {
        let result = if cli.test {
            test_file(file)
        } else if cli.decompress {
            decompress_file(file, &cli)
        } else {
            compress_file(file, &cli)
        };
        if let Err(e) = result {
            error!("{}: {:#}", file, e);
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{} of {} files failed", failures, files.len());
    }
    Ok(())
}

/// Compress a single operand.
///
/// Regular files become `<file><suffix>` next to the input, carrying the
/// file's name and modification time unless `-n` is given.
fn compress_file(file: &str, cli: &Cli) -> Result<()> {
    let mut header = Header::new()
        .with_os(Os::current())
        .with_header_crc(cli.header_crc);
    if let Some(comment) = &cli.comment {
        header = header.with_comment(comment.clone());
    }

    if Cli::is_stdio(file) {
        let stdout = io::stdout().lock();
        return compress_stream(io::stdin().lock(), stdout, header, cli);
    }

    if file.ends_with(&cli.suffix) {
        warn!("{} already has {} suffix -- unchanged", file, cli.suffix);
        return Ok(());
    }

    let input_path = Path::new(file);
    let input = File::open(input_path).with_context(|| format!("cannot open {}", file))?;
    let metadata = input.metadata()?;
    if !metadata.is_file() {
        bail!("not a regular file");
    }

    if !cli.no_name {
        header = header_with_origin(header, input_path, &metadata);
    }

    if cli.stdout {
        return compress_stream(input, io::stdout().lock(), header, cli);
    }

    let output_path = PathBuf::from(format!("{}{}", file, cli.suffix));
    let output = create_output(&output_path, cli)?;
    if let Err(e) = compress_stream(input, BufWriter::new(output), header, cli) {
        let _ = fs::remove_file(&output_path);
        return Err(e);
    }

    if !cli.keeps_input() {
        fs::remove_file(input_path)?;
    }
    info!("{} -> {}", file, output_path.display());
    Ok(())
}

/// Record the file name and modification time in the header.
///
/// Names that Latin-1 cannot represent are left out rather than failing.
fn header_with_origin(mut header: Header, path: &Path, metadata: &fs::Metadata) -> Header {
    if let Ok(modified) = metadata.modified() {
        header = header.with_mtime(modified);
    }
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        warn!("{}: file name is not valid UTF-8, not stored", path.display());
        return header;
    };
    match latin1::encode(name) {
        Ok(_) => header.with_name(name),
        Err(e) => {
            warn!("{}: file name not stored: {}", path.display(), e);
            header
        }
    }
}

fn compress_stream<R: Read, W: Write>(
    mut input: R,
    output: W,
    header: Header,
    cli: &Cli,
) -> Result<()> {
    let mut writer = GzWriter::with_header(output, header, cli.compression());
    io::copy(&mut input, &mut writer)?;
    let mut output = writer.finish()?;
    output.flush()?;
    Ok(())
}

/// Decompress a single operand.
///
/// The output name is the input name without its suffix, or the name stored
/// in the header when `-N` is given.
fn decompress_file(file: &str, cli: &Cli) -> Result<()> {
    if Cli::is_stdio(file) {
        let stdout = io::stdout().lock();
        return decompress_stream(io::stdin().lock(), stdout).map(|_| ());
    }

    let Some(stem) = file.strip_suffix(&cli.suffix).filter(|s| !s.is_empty()) else {
        bail!("unknown suffix -- ignored");
    };

    let input = File::open(file).with_context(|| format!("cannot open {}", file))?;
    let mut reader = GzReader::new(BufReader::new(input))?;

    if cli.stdout {
        copy_payload(&mut reader, io::stdout().lock())?;
        return Ok(());
    }

    let output_path = match reader.header().name().filter(|_| cli.name) {
        Some(stored) => restored_path(Path::new(file), stored)?,
        None => PathBuf::from(stem),
    };
    ensure_distinct(Path::new(file), &output_path)?;
    let output = create_output(&output_path, cli)?;
    let result = copy_payload(&mut reader, BufWriter::new(output));
    if let Err(e) = result {
        let _ = fs::remove_file(&output_path);
        return Err(e);
    }

    if cli.name {
        if let Some(mtime) = reader.header().mtime() {
            File::options()
                .write(true)
                .open(&output_path)?
                .set_modified(mtime)?;
        }
    }
    if !cli.keeps_input() {
        fs::remove_file(file)?;
    }
    info!("{} -> {}", file, output_path.display());
    Ok(())
}

/// Place a stored name next to the input, ignoring any directory components.
fn restored_path(input: &Path, stored: &str) -> Result<PathBuf> {
    let Some(base) = Path::new(stored).file_name() else {
        bail!("stored name {:?} is not usable", stored);
    };
    Ok(input.with_file_name(base))
}

/// Refuse an output path that names the input being read.
fn ensure_distinct(input: &Path, output: &Path) -> Result<()> {
    let same = match (fs::canonicalize(input), fs::canonicalize(output)) {
        (Ok(input), Ok(output)) => input == output,
        _ => input == output,
    };
    if same {
        bail!("{} would overwrite its own input", output.display());
    }
    Ok(())
}

fn decompress_stream<R: BufRead, W: Write>(input: R, output: W) -> Result<u64> {
    let mut reader = GzReader::new(input)?;
    copy_payload(&mut reader, output)
}

fn copy_payload<R: BufRead, W: Write>(reader: &mut GzReader<R>, mut output: W) -> Result<u64> {
    let n = io::copy(reader, &mut output)?;
    output.flush()?;
    reader.close();
    Ok(n)
}

fn create_output(path: &Path, cli: &Cli) -> Result<File> {
    if path.exists() && !cli.force {
        bail!("{} already exists (use -f to overwrite)", path.display());
    }
    File::create(path).with_context(|| format!("cannot create {}", path.display()))
}

/// Decompress to nowhere, verifying the trailer.
fn test_file(file: &str) -> Result<()> {
    let n = if Cli::is_stdio(file) {
        decompress_stream(io::stdin().lock(), io::sink())?
    } else {
        let input = File::open(file).with_context(|| format!("cannot open {}", file))?;
        decompress_stream(BufReader::new(input), io::sink())?
    };
    info!("{}: OK ({} bytes)", file, n);
    Ok(())
}

/// List gzip files, reading only their headers and trailers.
async fn list_files(files: &[String], cli: &Cli) -> Result<()> {
    if cli.verbose > 0 {
        println!(
            "{:<6} {:<8} {:<16} {:>19} {:>19} {:>6} uncompressed_name",
            "method", "crc", "date", "compressed", "uncompressed", "ratio"
        );
    } else {
        println!(
            "{:>19} {:>19} {:>6} uncompressed_name",
            "compressed", "uncompressed", "ratio"
        );
    }

    let mut total_compressed = 0u64;
    let mut total_uncompressed = 0u64;
    let mut failures = 0usize;

    for file in files {
        let entry = if Cli::is_http_url(file) {
            match HttpRangeReader::new(file.clone()).await {
                Ok(reader) => {
                    let reader = Arc::new(reader);
                    let entry = inspect(reader.clone()).await;
                    info!("{}: {} bytes transferred", file, reader.transferred_bytes());
                    entry
                }
                Err(e) => Err(e),
            }
        } else if Cli::is_stdio(file) {
            Err(anyhow::anyhow!("cannot list standard input"))
        } else {
            match LocalFileReader::new(Path::new(file)) {
                Ok(reader) => inspect(Arc::new(reader)).await,
                Err(e) => Err(e),
            }
        };

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!("{}: {:#}", file, e);
                failures += 1;
                continue;
            }
        };

        let file_size = entry.header_len + entry.compressed_size + 8;
        total_compressed += file_size;
        total_uncompressed += u64::from(entry.uncompressed_size);

        let name = display_name(file, &entry, cli);
        if cli.verbose > 0 {
            let date = entry
                .header
                .mtime()
                .map(|t| DateTime::<Utc>::from(t).format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<6} {:08x} {:<16} {:>19} {:>19} {:>5.1}% {}",
                "defla",
                entry.crc32,
                date,
                file_size,
                entry.uncompressed_size,
                entry.ratio(),
                name
            );
        } else {
            println!(
                "{:>19} {:>19} {:>5.1}% {}",
                file_size,
                entry.uncompressed_size,
                entry.ratio(),
                name
            );
        }
    }

    if files.len() > 1 {
        let ratio = if total_uncompressed > 0 {
            let uncompressed = total_uncompressed as f64;
            (uncompressed - total_compressed as f64) * 100.0 / uncompressed
        } else {
            0.0
        };
        let pad = if cli.verbose > 0 { " ".repeat(33) } else { String::new() };
        println!(
            "{}{:>19} {:>19} {:>5.1}% (totals)",
            pad, total_compressed, total_uncompressed, ratio
        );
    }

    if failures > 0 {
        bail!("{} of {} files could not be listed", failures, files.len());
    }
    Ok(())
}

async fn inspect<R: ReadAt + 'static>(reader: Arc<R>) -> Result<GzEntry> {
    GzInspector::new(reader).inspect().await
}

/// Name shown by `-l`: the stored name with `-N`, else the file name minus its suffix.
fn display_name(file: &str, entry: &GzEntry, cli: &Cli) -> String {
    if cli.name {
        if let Some(name) = entry.header.name() {
            return name.to_string();
        }
    }
    let base = if Cli::is_http_url(file) {
        file.rsplit('/').next().unwrap_or(file)
    } else {
        file
    };
    base.strip_suffix(&cli.suffix).unwrap_or(base).to_string()
}
