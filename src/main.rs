//! CLI entry point for `popbackup`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use popbackup::backup::{self, BackupReport, MessageView, Reporter, TracingReporter};
use popbackup::config::{self, Config};
use popbackup::error::BackupError;
use popbackup::extract::extract_primary_text;
use popbackup::logging;
use popbackup::model::extraction::{BodyTag, Extracted};
use popbackup::parser::header::{dump_header_value, read_entity};
use popbackup::pop3::{self, MessageSource};

#[derive(Parser)]
#[command(name = "popbackup", version, about = "Back up a POP3 mailbox and extract message bodies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every message from the POP3 server into the backup directory
    Fetch {
        /// Do not print message headers and bodies
        #[arg(short, long)]
        quiet: bool,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Extract the primary body of .eml files
    Extract {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Classify every saved message in a directory
    Scan {
        dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Write the current configuration (without the password) to the config file
    InitConfig,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config()?;

    // Configure logging: stderr + log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Fetch { quiet, json } => cmd_fetch(&config, quiet, json),
        Commands::Extract { files, json } => cmd_extract(&files, json),
        Commands::Scan { dir, json } => cmd_scan(&dir, json),
        Commands::InitConfig => cmd_init_config(&config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(logging::stderr_filter(level));

    let log_dir = &config.general.log_dir;
    if std::fs::create_dir_all(log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(log_dir, &config.general.log_file);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender)
            .with_filter(logging::file_filter(level));

        tracing_subscriber::registry()
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry().with(stderr_layer).init();
    }
}

/// Save the effective configuration so it can be edited by hand.
fn cmd_init_config(config: &Config) -> anyhow::Result<()> {
    let mut config = config.clone();
    config.pop3.password.clear();
    config::save_config(&config)?;
    if let Some(path) = config::config_file_path() {
        println!("  Wrote {}", path.display());
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "popbackup", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

// ── fetch ───────────────────────────────────────────────────────

/// Logs through `tracing` and prints each message above the progress bar.
struct ConsoleReporter {
    inner: TracingReporter,
    progress: ProgressBar,
    print_bodies: bool,
}

impl Reporter for ConsoleReporter {
    fn info(&mut self, id: Option<u32>, message: &str) {
        self.inner.info(id, message);
    }

    fn warn(&mut self, id: Option<u32>, message: &str) {
        self.inner.warn(id, message);
    }

    fn error(&mut self, id: Option<u32>, message: &str) {
        self.inner.error(id, message);
    }

    fn body_result(&mut self, id: u32, tag: BodyTag) {
        self.inner.body_result(id, tag);
    }

    fn view(&mut self, view: &MessageView<'_>) {
        if self.print_bodies {
            self.progress.suspend(|| print_message_view(view));
        }
    }
}

fn print_message_view(view: &MessageView<'_>) {
    println!("Message ID: {}", view.summary.id);
    println!("Subject: {}", view.summary.subject);
    println!("From: {}", view.summary.from);
    println!("Date: {}", view.header.get("date").unwrap_or(""));
    println!("All Headers:");
    for field in view.header.fields() {
        println!("  {}: {}", field.name, dump_header_value(&field.value));
    }
    println!("Body:\n{}", view.extracted.text());
    println!("====================================");
    println!();
}

/// Connect, log in and back up every message.
fn cmd_fetch(config: &Config, quiet: bool, json: bool) -> anyhow::Result<()> {
    config.pop3.validate()?;

    let mut client = pop3::connect(&config.pop3)?;
    client.login(&config.pop3.username, &config.pop3.password)?;

    let (count, size) = client.stat()?;
    if !json {
        println!("total messages={count} size={size}");
    }

    let pb = if json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(count as u64)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Backing up [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let mut reporter = ConsoleReporter {
        inner: TracingReporter,
        progress: pb.clone(),
        print_bodies: config.backup.print_bodies && !quiet && !json,
    };

    let start = Instant::now();
    let result = backup::run(&mut client, &config.backup, &mut reporter, &|done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    });
    pb.finish_and_clear();

    if let Err(e) = client.quit() {
        tracing::warn!(error = %e, "QUIT failed");
    }
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_backup_summary(
            &report,
            &config.backup.mail_dir,
            &config::log_file_path(config),
            start.elapsed(),
        );
    }
    Ok(())
}

fn print_backup_summary(
    report: &BackupReport,
    mail_dir: &Path,
    log_file: &Path,
    elapsed: std::time::Duration,
) {
    println!();
    println!("  {:<20} {}", "Backup directory", mail_dir.display());
    println!("  {:<20} {}", "Messages", report.total);
    println!("  {:<20} {}", "Saved", report.saved);
    println!("  {:<20} {}", "Failed", report.failed);
    println!("  {:<20} {:.2?}", "Elapsed", elapsed);
    println!("  {:<20} {}", "Log file", log_file.display());
    let counts = report.tag_counts();
    if !counts.is_empty() {
        println!();
        for (tag, count) in counts {
            println!("    {count:>6}  {tag}");
        }
    }
    println!();
}

// ── extract ─────────────────────────────────────────────────────

fn extract_file(path: &Path) -> anyhow::Result<Extracted> {
    if !path.exists() {
        return Err(BackupError::FileNotFound(path.to_path_buf()).into());
    }
    let file = File::open(path).map_err(|e| BackupError::io(path, e))?;
    let entity = read_entity(BufReader::new(file))?;
    Ok(extract_primary_text(entity))
}

/// Run body extraction on each file and print the result.
fn cmd_extract(files: &[PathBuf], json: bool) -> anyhow::Result<()> {
    let mut items = Vec::with_capacity(files.len());

    for path in files {
        let extracted = extract_file(path)?;
        for degradation in &extracted.degradations {
            tracing::warn!(file = %path.display(), "{degradation}");
        }

        if json {
            items.push(serde_json::json!({
                "file": path.to_string_lossy(),
                "tag": extracted.tag(),
                "text": extracted.text(),
                "degradations": extracted
                    .degradations
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>(),
            }));
        } else {
            println!("{} {}", path.display(), extracted.tag());
            println!("{}", extracted.text());
            println!();
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    }
    Ok(())
}

// ── scan ────────────────────────────────────────────────────────

/// Classify every message file in `dir` and print counts per tag.
fn cmd_scan(dir: &Path, json: bool) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    if !dir.is_dir() {
        return Err(BackupError::FileNotFound(dir.to_path_buf()).into());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| BackupError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| backup::writer::is_message_file(p))
        .collect();
    paths.sort();

    let pb = if json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(paths.len() as u64)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Scanning [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("#>-"),
    );

    let mut counts: BTreeMap<BodyTag, usize> = BTreeMap::new();
    let mut total_size = 0u64;
    let mut unreadable = 0usize;

    for (i, path) in paths.iter().enumerate() {
        pb.set_position(i as u64);
        total_size += std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        match extract_file(path) {
            Ok(extracted) => *counts.entry(extracted.tag()).or_default() += 1,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Skipping unreadable message");
                unreadable += 1;
            }
        }
    }
    pb.finish_and_clear();

    if json {
        let output = serde_json::json!({
            "dir": dir.to_string_lossy(),
            "message_count": paths.len(),
            "total_size": total_size,
            "unreadable": unreadable,
            "tags": counts
                .iter()
                .map(|(tag, count)| (tag.as_str().to_string(), serde_json::json!(count)))
                .collect::<serde_json::Map<_, _>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("  {:<20} {}", "Directory", dir.display());
    println!("  {:<20} {}", "Messages", paths.len());
    println!("  {:<20} {}", "Total size", format_size(total_size, BINARY));
    if unreadable > 0 {
        println!("  {:<20} {}", "Unreadable", unreadable);
    }
    println!();
    for (tag, count) in &counts {
        println!("    {count:>6}  {tag}");
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["popbackup", "-vv", "extract", "a.eml", "b.eml", "--json"])
            .expect("parse");
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Extract { files, json } => {
                assert_eq!(files, [PathBuf::from("a.eml"), PathBuf::from("b.eml")]);
                assert!(json);
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_extract_requires_a_file() {
        assert!(Cli::try_parse_from(["popbackup", "extract"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
