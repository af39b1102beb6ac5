//! CLI entry point for complyguard.
//!
//! This module is intentionally thin: it handles argument parsing, I/O, and exit codes.
//! All business logic lives in the `complyguard-app` crate.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use complyguard_app::{
    EXIT_CONFIG_ERROR, EXIT_PASSED, ExplainOutput, RuleSource, ScanInput, exit_code,
    merge_reports, parse_report_json, render_annotations, render_markdown, resolve_subject,
    resolve_timestamp, run_explain, run_scan, run_validate, serialize_report,
};
use complyguard_settings::Overrides;
use complyguard_types::ComplianceReport;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "complyguard.toml";

#[derive(Parser, Debug)]
#[command(
    name = "complyguard",
    version,
    about = "Policy-driven compliance scanner producing reproducible audit evidence"
)]
struct Cli {
    /// Log debug detail to stderr (overrides RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a source tree and write the evidence report.
    Scan {
        /// Rule set file (TOML or JSON), or `preset:NAME` for a built-in set.
        #[arg(long)]
        rules: String,

        /// Directory to scan.
        #[arg(long, default_value = ".")]
        root: Utf8PathBuf,

        /// Scan settings file. Defaults to complyguard.toml in the root, if present.
        #[arg(long)]
        config: Option<Utf8PathBuf>,

        /// Worker threads (overrides the settings file).
        #[arg(long)]
        concurrency: Option<usize>,

        /// Scan-wide deadline in seconds (overrides the settings file).
        #[arg(long)]
        timeout: Option<u64>,

        /// JSON file with repository metadata for metadata-check rules.
        #[arg(long)]
        metadata: Option<Utf8PathBuf>,

        /// Repository identity (default: $GITHUB_REPOSITORY, then "unknown").
        #[arg(long)]
        repository: Option<String>,

        /// Commit identity (default: $GITHUB_SHA, then "unknown").
        #[arg(long)]
        commit: Option<String>,

        /// Report timestamp, RFC 3339 (default: $SOURCE_DATE_EPOCH, then now).
        #[arg(long)]
        timestamp: Option<String>,

        /// Where to write the JSON report.
        #[arg(long, default_value = "artifacts/complyguard/report.json")]
        report_out: Utf8PathBuf,

        /// Also write a Markdown report here.
        #[arg(long)]
        markdown_out: Option<Utf8PathBuf>,
    },

    /// Render Markdown from an existing JSON report.
    Md {
        #[arg(long, default_value = "artifacts/complyguard/report.json")]
        report: Utf8PathBuf,

        /// Where to write the Markdown (stdout if omitted).
        #[arg(long, short)]
        output: Option<Utf8PathBuf>,
    },

    /// Render GitHub Actions annotations from an existing JSON report.
    Annotations {
        #[arg(long, default_value = "artifacts/complyguard/report.json")]
        report: Utf8PathBuf,

        /// Maximum number of annotations to emit.
        #[arg(long, default_value = "10")]
        max: usize,
    },

    /// Merge reports from sharded scans of the same subject.
    Merge {
        /// Where to write the merged JSON report.
        #[arg(long)]
        out: Utf8PathBuf,

        /// Shard reports.
        #[arg(required = true)]
        reports: Vec<Utf8PathBuf>,
    },

    /// Load and validate a rule set without scanning.
    Validate {
        /// Rule set file, or `preset:NAME`.
        #[arg(long)]
        rules: String,
    },

    /// Print a built-in rule set.
    Rules {
        #[arg(long, default_value = "baseline")]
        preset: String,
    },

    /// Explain an evaluator kind or finding code.
    Explain {
        /// e.g. "presence-check" or "scan_timeout".
        identifier: String,
    },

    /// Print the JSON Schema of the report (or of complyguard.toml).
    Schema {
        #[arg(long)]
        config: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.cmd {
        Commands::Scan {
            rules,
            root,
            config,
            concurrency,
            timeout,
            metadata,
            repository,
            commit,
            timestamp,
            report_out,
            markdown_out,
        } => cmd_scan(ScanArgs {
            rules,
            root,
            config,
            overrides: Overrides {
                concurrency,
                timeout_secs: timeout,
            },
            metadata,
            repository,
            commit,
            timestamp,
            report_out,
            markdown_out,
        }),
        Commands::Md { report, output } => cmd_md(&report, output.as_deref()),
        Commands::Annotations { report, max } => cmd_annotations(&report, max),
        Commands::Merge { out, reports } => cmd_merge(&out, &reports),
        Commands::Validate { rules } => cmd_validate(&rules),
        Commands::Rules { preset } => cmd_rules(&preset),
        Commands::Explain { identifier } => Ok(cmd_explain(&identifier)),
        Commands::Schema { config } => cmd_schema(config),
    };

    let code = match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("complyguard error: {err:#}");
            EXIT_CONFIG_ERROR
        }
    };
    std::process::exit(code);
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

struct ScanArgs {
    rules: String,
    root: Utf8PathBuf,
    config: Option<Utf8PathBuf>,
    overrides: Overrides,
    metadata: Option<Utf8PathBuf>,
    repository: Option<String>,
    commit: Option<String>,
    timestamp: Option<String>,
    report_out: Utf8PathBuf,
    markdown_out: Option<Utf8PathBuf>,
}

fn cmd_scan(args: ScanArgs) -> anyhow::Result<i32> {
    let root = args
        .root
        .canonicalize_utf8()
        .with_context(|| format!("scan root does not exist: {}", args.root))?;

    // A missing default config is fine; a missing explicit one is not.
    let config_text = match &args.config {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("read config: {path}"))?
        }
        None => {
            let path = root.join(DEFAULT_CONFIG);
            if path.is_file() {
                std::fs::read_to_string(&path).with_context(|| format!("read config: {path}"))?
            } else {
                String::new()
            }
        }
    };

    let metadata = match &args.metadata {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read metadata: {path}"))?;
            serde_json::from_str(&text).with_context(|| format!("parse metadata: {path}"))?
        }
        None => serde_json::Value::Null,
    };

    let env = |key: &str| std::env::var(key).ok();
    let subject = resolve_subject(args.repository, args.commit, env);
    let timestamp = resolve_timestamp(args.timestamp.as_deref(), env)?;

    let output = run_scan(ScanInput {
        root: &root,
        rules: RuleSource::parse(&args.rules),
        config_text: &config_text,
        overrides: args.overrides,
        metadata,
        subject,
        timestamp,
    })?;

    write_report_file(&args.report_out, &output.report)?;
    if let Some(path) = &args.markdown_out {
        write_text_file(path, &render_markdown(&output.report)).context("write markdown")?;
    }

    let summary = &output.report.summary;
    tracing::info!(
        overall = ?output.report.overall_status,
        failed = summary.failed,
        warnings = summary.warnings,
        errors = summary.errors,
        report = %args.report_out,
        "report written"
    );
    Ok(exit_code(output.report.overall_status))
}

fn read_report(path: &Utf8Path) -> anyhow::Result<ComplianceReport> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read report: {path}"))?;
    parse_report_json(&text).with_context(|| format!("parse report: {path}"))
}

fn write_report_file(path: &Utf8Path, report: &ComplianceReport) -> anyhow::Result<()> {
    let data = serialize_report(report)?;
    write_bytes(path, &data).context("write report json")
}

fn write_text_file(path: &Utf8Path, text: &str) -> anyhow::Result<()> {
    write_bytes(path, text.as_bytes())
}

fn write_bytes(path: &Utf8Path, data: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| format!("create directory: {parent}"))?;
    }
    std::fs::write(path, data).with_context(|| format!("write: {path}"))?;
    Ok(())
}

fn cmd_md(report_path: &Utf8Path, output: Option<&Utf8Path>) -> anyhow::Result<i32> {
    let md = render_markdown(&read_report(report_path)?);
    match output {
        Some(path) => write_text_file(path, &md).context("write markdown output")?,
        None => print!("{md}"),
    }
    Ok(EXIT_PASSED)
}

fn cmd_annotations(report_path: &Utf8Path, max: usize) -> anyhow::Result<i32> {
    for annotation in render_annotations(&read_report(report_path)?, max) {
        println!("{annotation}");
    }
    Ok(EXIT_PASSED)
}

fn cmd_merge(out: &Utf8Path, paths: &[Utf8PathBuf]) -> anyhow::Result<i32> {
    let reports = paths
        .iter()
        .map(|p| read_report(p))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let merged = merge_reports(&reports).context("merge reports")?;
    write_report_file(out, &merged)?;
    Ok(exit_code(merged.overall_status))
}

fn cmd_validate(rules: &str) -> anyhow::Result<i32> {
    let source = RuleSource::parse(rules);
    let output = run_validate(&source)?;
    if output.is_valid() {
        println!("{source}: {} rules OK", output.rules);
        return Ok(EXIT_PASSED);
    }
    for err in &output.errors {
        eprintln!("{source}: {err}");
    }
    Ok(EXIT_CONFIG_ERROR)
}

fn cmd_rules(preset: &str) -> anyhow::Result<i32> {
    print!("{}", complyguard_app::preset_text(preset)?);
    Ok(EXIT_PASSED)
}

fn cmd_explain(identifier: &str) -> i32 {
    match run_explain(identifier) {
        ExplainOutput::Found(exp) => {
            print!("{}", complyguard_app::format_explanation(&exp));
            EXIT_PASSED
        }
        ExplainOutput::NotFound {
            identifier,
            available_kinds,
            available_codes,
        } => {
            eprint!(
                "{}",
                complyguard_app::format_not_found(&identifier, available_kinds, available_codes)
            );
            1
        }
    }
}

fn cmd_schema(config: bool) -> anyhow::Result<i32> {
    let schema = if config {
        schemars::schema_for!(complyguard_settings::ComplyguardConfigV1)
    } else {
        schemars::schema_for!(ComplianceReport)
    };
    let text = serde_json::to_string_pretty(&schema).context("serialize schema")?;
    println!("{text}");
    Ok(EXIT_PASSED)
}
