use anyhow::{Context, Result};
use assembly_report::annotate::AnnotationConfig;
use assembly_report::filter::ThresholdLadder;
use assembly_report::pipeline::{self, QcOptions, QcPass, RunOptions, VariantOptions};
use assembly_report::types::{Platform, Strictness};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "assembly-report")]
#[command(version)]
#[command(about = "Quality-control and variant annotation reports for viral genome assemblies", long_about = None)]
struct Cli {
    /// Number of threads to use
    #[arg(long, global = true, default_value_t = num_cpus())]
    threads: usize,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging (per-variant annotation details)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Pipeline results directory
    #[arg(short, long)]
    results: PathBuf,

    /// Consensus subdirectory, e.g. high_freq (required for iVar variant calls)
    #[arg(short, long)]
    subdir: Option<String>,

    /// Sequencing platform and variant caller of the run
    #[arg(long, value_enum, default_value = "illumina")]
    platform: Platform,

    /// Fail when a sample is missing its QC, coverage or host depletion file
    #[arg(long)]
    strict: bool,
}

impl RunArgs {
    fn to_options(&self) -> RunOptions {
        RunOptions {
            results: self.results.clone(),
            subdir: self.subdir.clone(),
            platform: self.platform,
            strictness: if self.strict {
                Strictness::Strict
            } else {
                Strictness::Lenient
            },
        }
    }
}

#[derive(clap::Args)]
struct VariantArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Output directory for tables and plots
    #[arg(short, long, default_value = ".")]
    outdir: PathBuf,

    /// Only keep samples passing assembly QC
    #[arg(long)]
    qc_pass: bool,

    /// Minimum consensus completeness (%) with --qc-pass
    #[arg(long, default_value = "95.0")]
    min_complete: f64,

    /// Minimum mean depth with --qc-pass
    #[arg(long, default_value = "50.0")]
    min_depth: f64,

    /// GenBank reference for annotation
    #[arg(short, long)]
    genbank: Option<PathBuf>,

    /// Masked regions (tab-separated: start, end, annotation, source)
    #[arg(short, long)]
    mask: Option<PathBuf>,

    /// Point transparency in the variant distribution plot
    #[arg(long, default_value = "0.3")]
    freq_alpha: f64,

    /// Keep iVar calls that did not pass the significance test
    #[arg(long)]
    no_variant_pass: bool,

    /// Low frequency filter, e.g. 0.01:1000-0.05:300 (iVar only)
    #[arg(long)]
    low_freq_depth: Option<String>,

    /// Bases either side of a variant in its context string
    #[arg(long, default_value = "5")]
    context_size: usize,

    /// Plot output format
    #[cfg(feature = "plotting")]
    #[arg(long, value_enum, default_value = "png")]
    plot_format: assembly_report::plotting::PlotFormat,

    /// Skip plot generation
    #[arg(long)]
    no_plots: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Assembly quality control table
    Qc {
        #[command(flatten)]
        run: RunArgs,

        /// Write the QC table to this TSV file
        #[arg(short, long)]
        table_output: Option<PathBuf>,
    },
    /// Annotated variant tables, population summary and plots
    Variants(VariantArgs),
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

macro_rules! progress {
    ($quiet:expr) => {
        if !$quiet {
            eprintln!();
        }
    };
    ($quiet:expr, $($arg:tt)*) => {
        if !$quiet {
            eprintln!($($arg)*);
        }
    };
}

fn make_progress_bar(quiet: bool, len: u64) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("  [{elapsed_precise}/{eta_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

fn make_spinner(quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("  {spinner} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads)
        .build_global()
        .context("Failed to configure the thread pool")?;

    match &cli.command {
        Command::Qc { run, table_output } => run_qc(&cli, run, table_output.clone()),
        Command::Variants(args) => run_variants(&cli, args),
    }
}

fn run_qc(cli: &Cli, run: &RunArgs, table_output: Option<PathBuf>) -> Result<()> {
    progress!(cli.quiet, "Assembly QC");
    progress!(cli.quiet, "=========================================");
    progress!(cli.quiet, "Results: {}", run.results.display());
    progress!(cli.quiet, "Subdir: {}", run.subdir.as_deref().unwrap_or("-"));
    progress!(cli.quiet, "Platform: {:?}", run.platform);
    progress!(cli.quiet, "Threads: {}", cli.threads);
    progress!(cli.quiet);

    let spinner = make_spinner(cli.quiet)?;
    spinner.set_message("Collecting assembly metrics...");
    let report = pipeline::quality_control(&QcOptions {
        run: run.to_options(),
        table_output: table_output.clone(),
    })?;
    spinner.finish_and_clear();

    println!("{}", report.table);

    if let Some(path) = table_output {
        progress!(cli.quiet, "QC table written to: {}", path.display());
    }
    Ok(())
}

fn run_variants(cli: &Cli, args: &VariantArgs) -> Result<()> {
    let low_freq_depth = args
        .low_freq_depth
        .as_deref()
        .map(ThresholdLadder::parse)
        .transpose()?;

    let opts = VariantOptions {
        run: args.run.to_options(),
        outdir: args.outdir.clone(),
        qc_pass: args.qc_pass.then_some(QcPass {
            min_complete: args.min_complete,
            min_depth: args.min_depth,
        }),
        genbank: args.genbank.clone(),
        mask: args.mask.clone(),
        variant_pass: !args.no_variant_pass,
        low_freq_depth,
        annotation: AnnotationConfig {
            context_size: args.context_size,
        },
    };

    progress!(cli.quiet, "Variant report");
    progress!(cli.quiet, "=========================================");
    progress!(cli.quiet, "Results: {}", args.run.results.display());
    progress!(cli.quiet, "Platform: {:?}", args.run.platform);
    progress!(cli.quiet, "Output directory: {}", args.outdir.display());
    if let Some(gate) = &opts.qc_pass {
        progress!(
            cli.quiet,
            "QC pass: completeness >= {}, mean depth >= {}",
            gate.min_complete,
            gate.min_depth
        );
    }
    if let Some(ladder) = &opts.low_freq_depth {
        progress!(cli.quiet, "Low frequency filter: {}", ladder);
    }
    progress!(cli.quiet);

    progress!(cli.quiet, "Annotating variants...");
    let pb = make_progress_bar(cli.quiet, 0)?;
    let report = match pipeline::variant_report(&opts, Some(&pb))? {
        Some(report) => report,
        None => {
            progress!(cli.quiet, "Annotation skipped (requires --genbank and --mask)");
            return Ok(());
        }
    };

    progress!(cli.quiet, "  Variants retained: {}", report.variants.len());
    progress!(cli.quiet, "  Distinct variants: {}", report.population.len());
    progress!(cli.quiet, "  Mask regions overlapping CDS: {}", report.mask_cds.len());

    #[cfg(feature = "plotting")]
    if !args.no_plots && report.platform.uses_ivar() {
        run_plots(cli, args, &report)?;
    }

    #[cfg(not(feature = "plotting"))]
    if !args.no_plots {
        log::warn!("plotting feature not enabled. Rebuild with default features to enable plots.");
    }

    progress!(cli.quiet);
    progress!(cli.quiet, "Done! Results written to: {}", report.names.variants().display());
    Ok(())
}

/// Generate the variant distribution and per-sample plots.
#[cfg(feature = "plotting")]
fn run_plots(cli: &Cli, args: &VariantArgs, report: &pipeline::VariantReport) -> Result<()> {
    use assembly_report::plotting;

    let config = plotting::PlotConfig {
        format: args.plot_format,
        ..plotting::PlotConfig::default()
    };
    let ext = config.format.extension();

    if !plotting::fonts_available() {
        log::warn!(
            "No usable TrueType font found, skipping plots; set {} to a .ttf file",
            plotting::FONT_ENV
        );
        return Ok(());
    }

    progress!(cli.quiet, "Generating plots...");

    plotting::plot_variant_distribution(
        &report.variants,
        report.reference_length,
        &report.regions,
        args.freq_alpha,
        &report.names.variant_distribution(ext),
        &config,
    )?;

    if report.apobec3.is_empty() {
        log::warn!("No classified variants, skipping APOBEC3 plot");
    } else {
        plotting::plot_apobec3_profiles(&report.apobec3, &report.names.apobec_samples(ext), &config)?;
    }

    if report.non_synonymous.is_empty() {
        log::warn!("No amino acid annotations, skipping non-synonymous plot");
    } else {
        plotting::plot_non_synonymous_profiles(&report.non_synonymous, &report.names.ns_samples(ext), &config)?;
    }

    Ok(())
}
