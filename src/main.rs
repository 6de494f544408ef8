use std::fs::{self, File};
use std::io::{self, copy, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use ignore::{DirEntry, WalkBuilder};
use log::{debug, info, warn};
use time::OffsetDateTime;
use zip::write::SimpleFileOptions;

use afterarch::{AppendWriter, TailZip};

mod cli;
use crate::cli::Cli;
use crate::cli::Commands;
use crate::cli::Config;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  caused by: {}", s);
                source = s.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    debug!("CONFIG: {:?}", config);

    match cli.command {
        Commands::Write {
            output,
            host,
            paths,
        } => write(&config, &output, host.as_deref(), &paths),
        Commands::List { file } => list(file),
        Commands::Cat { file, entry } => cat(&file, &entry),
        Commands::Info { file } => show_info(file),
    }
}

fn write(config: &Config, output: &Path, host: Option<&Path>, paths: &[PathBuf]) -> CliResult<()> {
    let mut writer = match host {
        Some(host) => AppendWriter::after_image(host, output)?,
        None => AppendWriter::after_current_exe(output)?,
    };
    let options = config.entry_options();

    // The output sits in the walked tree when written next to its inputs
    let output_canon = fs::canonicalize(output).ok();

    for root in paths {
        let walker = WalkBuilder::new(root)
            .follow_links(config.follow_links)
            .standard_filters(false)
            .same_file_system(config.same_fs)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            match entry {
                Ok(e) if cli::is_output(output_canon.as_deref(), e.path()) => {
                    debug!("SKIP: {} (output file)", e.path().display())
                }
                Ok(e) if e.file_type().is_some_and(|ft| ft.is_file()) => {
                    let name = cli::entry_name(root, e.path());

                    // One unreadable file should not sink the whole archive
                    match add_file(&mut writer, &name, &e, options.clone()) {
                        Ok(len) => info!("ADD: {} ({} bytes)", name, len),
                        Err(err) => {
                            warn!("SKIP: {}: {}", e.path().display(), err);
                            eprintln!("Skipping {}: {}", e.path().display(), err);
                        }
                    }
                }
                Ok(e) => debug!("SKIP: {}", e.path().display()),
                Err(e) => warn!("ERRR: {}", e),
            }
        }
    }

    let archive_size = writer.close()?;
    println!(
        "Wrote {} archive bytes to {}",
        archive_size,
        output.display()
    );
    Ok(())
}

fn add_file(
    writer: &mut AppendWriter<File>,
    name: &str,
    entry: &DirEntry,
    options: SimpleFileOptions,
) -> CliResult<u64> {
    let mut file = File::open(entry.path())?;

    let options = match file.metadata().and_then(|m| m.modified()) {
        Ok(mtime) => match zip::DateTime::try_from(OffsetDateTime::from(mtime)) {
            Ok(dt) => options.last_modified_time(dt),
            Err(_) => {
                debug!("mtime of {} does not fit in zip", name);
                options
            }
        },
        Err(_) => options,
    };

    Ok(writer.append_entry_with_header(name, options, &mut file)?)
}

fn open_target(file: Option<PathBuf>) -> CliResult<TailZip<File>> {
    Ok(match file {
        Some(path) => afterarch::open_path(path)?,
        None => afterarch::open_current_exe()?,
    })
}

fn list(file: Option<PathBuf>) -> CliResult<()> {
    let mut zip = open_target(file)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for i in 0..zip.len() {
        let entry = zip.by_index(i)?;
        writeln!(out, "{:>10}  {}", entry.size(), entry.name())?;
    }
    Ok(())
}

fn cat(file: &Path, name: &str) -> CliResult<()> {
    let mut zip = afterarch::open_path(file)?;
    let mut entry = zip.by_name(name)?;

    copy(&mut entry, &mut io::stdout().lock())?;
    Ok(())
}

fn show_info(file: Option<PathBuf>) -> CliResult<()> {
    let path = match file {
        Some(path) => path,
        None => std::env::current_exe()?,
    };

    let mut handle = File::open(&path)?;
    let range = afterarch::locate(&mut handle)?;
    let zip = afterarch::open(handle)?;

    println!("file:          {}", path.display());
    println!("archive start: {}", range.start);
    println!("archive size:  {}", range.len);
    println!("trailer at:    {}", range.end());
    println!("entries:       {}", zip.len());
    Ok(())
}
