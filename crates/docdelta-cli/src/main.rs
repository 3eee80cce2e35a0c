//! docdelta command-line interface.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use docdelta_core::{
    Revision, Rgb, ValidationFinding, WmlComparer, WmlComparerConsolidateSettings,
    WmlComparerSettings, WmlDocument, WmlRevisedDocumentInfo,
};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "docdelta")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
#[command(about = "Compare Word documents and work with tracked changes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file with comparer settings
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Mark up REVISED with the changes from ORIGINAL
    Compare {
        original: PathBuf,
        revised: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Author for the new revisions
        #[arg(long)]
        author: Option<String>,

        /// Date for the new revisions (ISO 8601)
        #[arg(long)]
        date: Option<String>,

        /// Write intermediate comparison state into this directory
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },
    /// Merge several reviewers' copies into ORIGINAL
    Consolidate {
        original: PathBuf,

        /// A reviewer as NAME:COLOR:PATH, e.g. "Ann:#FF0000:ann.docx"
        #[arg(short, long = "reviewer", required = true, value_parser = parse_reviewer)]
        reviewers: Vec<ReviewerArg>,

        #[arg(short, long)]
        output: PathBuf,

        /// Stop at the first reviewer that cannot be compared
        #[arg(long)]
        fail_fast: bool,

        /// Leave changed blocks inline instead of in shaded reviewer tables
        #[arg(long)]
        no_table: bool,
    },
    /// Accept every tracked change
    Accept {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },
    /// Reject every tracked change
    Reject {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },
    /// List the tracked changes of a document
    Revisions { input: PathBuf },
    /// Check a document's structure and revision markup
    Validate { input: PathBuf },
}

#[derive(Clone, Debug)]
struct ReviewerArg {
    name: String,
    color: Rgb,
    path: PathBuf,
}

fn parse_reviewer(value: &str) -> std::result::Result<ReviewerArg, String> {
    let mut parts = value.splitn(3, ':');
    let (Some(name), Some(color), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected NAME:COLOR:PATH, got '{}'", value));
    };
    Ok(ReviewerArg {
        name: name.to_string(),
        color: color.parse().map_err(|e| format!("{}", e))?,
        path: PathBuf::from(path),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut settings = load_settings(cli.settings.as_deref())?;
    match cli.command {
        Commands::Compare {
            original,
            revised,
            output,
            author,
            date,
            debug_dir,
        } => {
            if let Some(author) = author {
                settings = settings.with_author(author);
            }
            if let Some(date) = date {
                settings = settings.with_date_time(date);
            }
            if let Some(dir) = debug_dir {
                settings = settings.with_debug_output_dir(dir);
            }
            let original = read_document(&original)?;
            let revised = read_document(&revised)?;
            let result = WmlComparer::compare(&original, &revised, Some(&settings))
                .context("comparison failed")?;
            write_document(&output, &result.document)?;
            print_revisions(&result.revisions, cli.json)?;
        }
        Commands::Consolidate {
            original,
            reviewers,
            output,
            fail_fast,
            no_table,
        } => {
            let original = read_document(&original)?;
            let infos = reviewers
                .iter()
                .map(|r| Ok(WmlRevisedDocumentInfo::new(read_document(&r.path)?, r.name.clone(), r.color)))
                .collect::<Result<Vec<_>>>()?;
            let consolidate_settings = WmlComparerConsolidateSettings {
                fail_fast,
                consolidate_with_table: !no_table,
            };
            let result =
                WmlComparer::consolidate(&original, &infos, Some(&settings), Some(&consolidate_settings))
                    .context("consolidation failed")?;
            write_document(&output, &result.document)?;

            if cli.json {
                let report = serde_json::json!({
                    "revisions": result.revisions,
                    "per_reviewer": result.per_reviewer,
                    "failures": result.failures,
                    "suppressed": result.suppressed,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_revisions(&result.revisions, false)?;
                for reviewer in &result.per_reviewer {
                    println!("{} ({}): {} revisions", reviewer.revisor, reviewer.color, reviewer.revisions);
                }
                for failure in &result.failures {
                    eprintln!("skipped {}: {}", failure.revisor, failure.message);
                }
                if !result.suppressed.is_empty() {
                    println!("{} duplicate changes suppressed", result.suppressed.len());
                }
            }
        }
        Commands::Accept { input, output } => {
            let document = read_document(&input)?;
            let accepted = WmlComparer::accept_revisions(&document).context("accepting revisions failed")?;
            write_document(&output, &accepted)?;
        }
        Commands::Reject { input, output } => {
            let document = read_document(&input)?;
            let rejected = WmlComparer::reject_revisions(&document).context("rejecting revisions failed")?;
            write_document(&output, &rejected)?;
        }
        Commands::Revisions { input } => {
            let document = read_document(&input)?;
            let revisions = WmlComparer::get_revisions(&document).context("reading revisions failed")?;
            print_revisions(&revisions, cli.json)?;
        }
        Commands::Validate { input } => {
            let document = read_document(&input)?;
            let findings = docdelta_core::validate_document(&document).context("validation failed")?;
            print_findings(&findings, cli.json)?;
            if !findings.is_empty() {
                bail!("{} problems found in {}", findings.len(), input.display());
            }
        }
    }
    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<WmlComparerSettings> {
    let Some(path) = path else {
        return Ok(WmlComparerSettings::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
    let settings: WmlComparerSettings = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
    settings
        .validate()
        .with_context(|| format!("Invalid settings in {}", path.display()))?;
    Ok(settings)
}

fn read_document(path: &Path) -> Result<WmlDocument> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    WmlDocument::from_bytes(&bytes).with_context(|| format!("Failed to open {}", path.display()))
}

fn write_document(path: &Path, document: &WmlDocument) -> Result<()> {
    let bytes = document
        .to_bytes()
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

fn print_revisions(revisions: &[Revision], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(revisions)?);
        return Ok(());
    }
    for revision in revisions {
        println!(
            "{:<28} {:<16} {:?}",
            format!("{:?} ({})", revision.kind, revision.part),
            revision.author,
            revision.text
        );
    }
    println!("{} revisions", revisions.len());
    Ok(())
}

fn print_findings(findings: &[ValidationFinding], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(findings)?);
    } else {
        for finding in findings {
            println!("{}", finding);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reviewer_argument_keeps_colons_in_the_path() {
        let arg = parse_reviewer("Ann:#00FF00:C:/docs/ann.docx").unwrap();
        assert_eq!(arg.name, "Ann");
        assert_eq!(arg.color, Rgb(0, 0xFF, 0));
        assert_eq!(arg.path, PathBuf::from("C:/docs/ann.docx"));
        assert!(parse_reviewer("Ann.docx").is_err());
        assert!(parse_reviewer("Ann:blue:a.docx").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
