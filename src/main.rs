//! peheader CLI - inspect and validate PE headers.
//!
//! `inspect` prints the headers of a single file; `scan` validates many files
//! in parallel and reports one line per file.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use anyhow::Context;
use bytesize::ByteSize;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use peheader::{read_with, DirectoryEntry, Machine, PeImage, ReadConfig, SectionCharacteristics};

/// Validating reader for PE/COFF headers.
#[derive(Parser)]
#[command(name = "peheader")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the headers of a single file
    Inspect {
        /// File to read
        file: PathBuf,

        /// Treat sections with out-of-bounds raw data as errors
        #[arg(long)]
        strict: bool,

        /// Do not report overlapping sections
        #[arg(long)]
        no_overlaps: bool,

        /// Print the parsed image as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate every file under the given paths
    Scan {
        /// Files or directories (searched recursively)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Treat sections with out-of-bounds raw data as errors
        #[arg(long)]
        strict: bool,

        /// Number of worker threads (defaults to available parallelism)
        #[arg(short, long)]
        jobs: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            file,
            strict,
            no_overlaps,
            json,
        } => {
            let config = ReadConfig {
                strict,
                detect_overlaps: !no_overlaps,
            };
            inspect(&file, &config, json)?;
        }

        Commands::Scan {
            paths,
            strict,
            jobs,
        } => {
            let config = ReadConfig {
                strict,
                ..Default::default()
            };
            scan(&paths, &config, jobs)?;
        }
    }

    Ok(())
}

fn inspect(file: &Path, config: &ReadConfig, json: bool) -> anyhow::Result<()> {
    let data = std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let image = read_with(&data, config)
        .with_context(|| format!("{} is not a valid PE image", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&image)?);
        return Ok(());
    }

    print_headers(&image);
    print_directories(&image);
    print_sections(&image);

    match image.clr_header(&data) {
        Ok(Some(clr)) => {
            println!("\nCLR header:");
            println!(
                "  Runtime version:  {}.{}",
                clr.major_runtime_version, clr.minor_runtime_version
            );
            println!(
                "  Metadata:         RVA 0x{:08X} ({})",
                clr.metadata.virtual_address,
                ByteSize::b(clr.metadata.size as u64)
            );
            println!("  Flags:            {:?}", clr.flags);
            println!("  Entry point:      {:?}", clr.entry_point());
        }
        Ok(None) => {}
        Err(e) => warn!("CLR header: {}", e),
    }

    if !image.anomalies.is_empty() {
        println!("\nAnomalies ({}):", image.anomalies.len());
        for anomaly in &image.anomalies {
            println!("  - {}", anomaly);
        }
    }

    Ok(())
}

fn print_headers(image: &PeImage) {
    let fh = &image.file_header;
    let oh = &image.optional_header;

    println!("PE header at 0x{:X}", image.nt_headers_offset);
    println!(
        "  Machine:          {:?} (0x{:04X})",
        fh.machine,
        fh.machine.raw()
    );
    println!("  Sections:         {}", fh.number_of_sections);
    println!("  Timestamp:        0x{:08X}", fh.time_date_stamp);
    println!("  Characteristics:  {:?}", fh.characteristics);
    println!(
        "  Format:           {} (magic 0x{:X})",
        if image.is_pe32_plus() { "PE32+" } else { "PE32" },
        oh.magic()
    );
    println!("  Entry point:      0x{:08X}", oh.address_of_entry_point());
    println!("  Image base:       0x{:X}", oh.image_base());
    println!(
        "  Alignment:        section 0x{:X}, file 0x{:X}",
        oh.section_alignment(),
        oh.file_alignment()
    );
    println!("  Size of image:    {}", ByteSize::b(oh.size_of_image() as u64));
    println!("  Subsystem:        {:?}", oh.subsystem());
    println!("  DLL flags:        {:?}", oh.dll_characteristics());
}

fn print_directories(image: &PeImage) {
    println!(
        "\nData directories ({} declared):",
        image.optional_header.number_of_rva_and_sizes()
    );
    for entry in DirectoryEntry::ALL {
        if let Some(dir) = image.data_directory(entry) {
            println!(
                "  {:<16} RVA 0x{:08X}  {:>10}",
                entry.name(),
                dir.virtual_address,
                ByteSize::b(dir.size as u64)
            );
        }
    }
}

fn print_sections(image: &PeImage) {
    println!("\nSections:");
    println!(
        "  {:<3} {:<8} {:>10} {:>10} {:>10} {:>12}  Flags",
        "#", "Name", "VirtAddr", "VirtSize", "RawPtr", "RawSize"
    );
    for (i, s) in image.sections.iter().enumerate() {
        println!(
            "  {:<3} {:<8} 0x{:08X} 0x{:08X} 0x{:08X} {:>12}  {}",
            i,
            s.name(),
            s.virtual_address,
            s.virtual_size(),
            s.pointer_to_raw_data,
            ByteSize::b(s.size_of_raw_data as u64),
            access_string(s.characteristics)
        );
    }
}

fn access_string(flags: SectionCharacteristics) -> String {
    [
        (SectionCharacteristics::MEM_READ, 'r'),
        (SectionCharacteristics::MEM_WRITE, 'w'),
        (SectionCharacteristics::MEM_EXECUTE, 'x'),
    ]
    .iter()
    .map(|&(flag, c)| if flags.contains(flag) { c } else { '-' })
    .collect()
}

/// Per-file result of a scan.
enum ScanOutcome {
    Parsed {
        machine: Machine,
        magic: u16,
        sections: usize,
        anomalies: usize,
    },
    Failed(String),
}

fn scan(paths: &[PathBuf], config: &ReadConfig, jobs: Option<usize>) -> anyhow::Result<()> {
    let mut files = Vec::new();
    for path in paths {
        collect_files(path, &mut files)
            .with_context(|| format!("failed to list {}", path.display()))?;
    }
    if files.is_empty() {
        println!("No files found");
        return Ok(());
    }

    let workers = jobs
        .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
        .unwrap_or(1)
        .clamp(1, files.len());
    debug!(files = files.len(), workers, "starting scan");

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    // Each worker pulls the next unclaimed index; outcomes are merged afterwards.
    let next = AtomicUsize::new(0);
    let (next, files, pb) = (&next, &files, &pb);
    let joined: Vec<thread::Result<Vec<(usize, ScanOutcome)>>> = thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                s.spawn(move || {
                    let mut local = Vec::new();
                    loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        let Some(path) = files.get(i) else {
                            break;
                        };
                        let outcome =
                            panic::catch_unwind(AssertUnwindSafe(|| scan_file(path, config)))
                                .unwrap_or_else(|_| {
                                    ScanOutcome::Failed("panicked while reading".into())
                                });
                        local.push((i, outcome));
                        pb.inc(1);
                    }
                    local
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join()).collect()
    });
    let outcomes = merge_outcomes(files.len(), joined);
    pb.finish_and_clear();

    let mut parsed = 0usize;
    let mut with_anomalies = 0usize;
    for (path, outcome) in files.iter().zip(&outcomes) {
        let path = path.display();
        match outcome {
            ScanOutcome::Parsed {
                machine,
                magic,
                sections,
                anomalies,
            } => {
                parsed += 1;
                if *anomalies > 0 {
                    with_anomalies += 1;
                }
                println!(
                    "ok    {}  {:?} magic=0x{:X} sections={} anomalies={}",
                    path, machine, magic, sections, anomalies
                );
            }
            ScanOutcome::Failed(msg) => println!("error {}  {}", path, msg),
        }
    }

    println!(
        "\n{} files: {} parsed ({} with anomalies), {} rejected",
        files.len(),
        parsed,
        with_anomalies,
        files.len() - parsed
    );
    Ok(())
}

/// Place worker outcomes by file index. Files claimed by a worker that
/// panicked have no outcome and are reported as failed.
fn merge_outcomes(
    count: usize,
    joined: Vec<thread::Result<Vec<(usize, ScanOutcome)>>>,
) -> Vec<ScanOutcome> {
    let mut slots: Vec<Option<ScanOutcome>> = (0..count).map(|_| None).collect();
    for result in joined {
        match result {
            Ok(local) => {
                for (i, outcome) in local {
                    if let Some(slot) = slots.get_mut(i) {
                        *slot = Some(outcome);
                    }
                }
            }
            Err(_) => warn!("scan worker panicked"),
        }
    }
    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| ScanOutcome::Failed("worker thread panicked".into())))
        .collect()
}

fn scan_file(path: &Path, config: &ReadConfig) -> ScanOutcome {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => return ScanOutcome::Failed(e.to_string()),
    };
    match read_with(&data, config) {
        Ok(image) => ScanOutcome::Parsed {
            machine: image.file_header.machine,
            magic: image.optional_header.magic(),
            sections: image.sections.len(),
            anomalies: image.anomalies.len(),
        },
        Err(e) => ScanOutcome::Failed(e.to_string()),
    }
}

/// Expand `path` into the files to scan. A directory named on the command
/// line is walked even if it is a symlink; symlinks met during the walk are
/// only followed to regular files.
fn collect_files(path: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if path.is_dir() {
        walk_dir(path, out)
    } else {
        out.push(path.to_path_buf());
        Ok(())
    }
}

fn walk_dir(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());
    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if let Err(e) = walk_dir(&path, out) {
                warn!(path = %path.display(), "skipping directory: {}", e);
            }
        } else if file_type.is_symlink() {
            if path.is_file() {
                out.push(path);
            } else {
                debug!(path = %path.display(), "not following symlink");
            }
        } else {
            out.push(path);
        }
    }
    Ok(())
}
