use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing::info;
use tracing::level_filters::LevelFilter;

use churnmap_core::{ChurnmapConfig, FilterConfig, OutputFormat};
use churnmap_history::analytics::{lorenz, resample, summarize, Statistics, Timeslot};
use churnmap_history::authors::AuthorActivity;
use churnmap_history::duration::Duration;
use churnmap_history::filter::GlobFilter;
use churnmap_history::hotgraph::{build_hotgraph, HotgraphOptions, HotgraphReport};
use churnmap_history::hotspots::{detect_hotspots, HotspotEntry, HotspotOptions};
use churnmap_history::mining::{ingest_with_progress, IngestOptions};
use churnmap_history::table::CommitTable;

#[derive(Parser)]
#[command(
    name = "churnmap",
    version,
    about = "Git history analytics: hotspots, contribution inequality, co-change graphs",
    long_about = "churnmap reads the commit history of a git repository and reports where change\n\
                   activity concentrates.\n\n\
                   History is exported once to CSV with `log`, then analysed from CSV by the\n\
                   other subcommands, so exports can be filtered, merged, and re-used.\n\n\
                   Examples:\n  \
                     churnmap log --full > history.csv      Export six months of history\n  \
                     churnmap info -i history.csv           Volume, refactor ratio, Gini\n  \
                     churnmap hotspot -i history.csv        Rank recently busy files\n  \
                     churnmap hotgraph -i history.csv       Files that change together\n  \
                     churnmap log --full | churnmap hotspot Pipe without a file"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .churnmap.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for reports.\n\n\
                       Formats:\n  \
                         text      Human-readable tables (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown (alias: md)\n\n\
                       CSV is not a report format: `log` always writes CSV, and\n\
                       `hotspot`/`hotgraph` take --csv."
    )]
    format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    verbose: u8,
}

/// CSV inputs and file filters shared by the analysis subcommands.
#[derive(Args)]
struct InputArgs {
    /// CSV exports to read; `-` reads stdin (default: stdin)
    #[arg(short, long = "input", default_value = "-")]
    inputs: Vec<PathBuf>,

    /// Only analyse files matching these globs (overrides [filter].allow)
    #[arg(long, num_args = 1..)]
    allow_files: Vec<String>,

    /// Skip files matching these globs (added to [filter].deny)
    #[arg(long, num_args = 1..)]
    ignore_files: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Export commit history to CSV
    #[command(long_about = "Export commit history to CSV.\n\n\
        Walks one branch inside a date window. Merge commits are kept with zeroed\n\
        counts. --full adds a per-file breakdown column, which hotspot and hotgraph need.\n\n\
        Window resolution, first match wins:\n  \
          --since and --until      explicit range\n  \
          --since and --month      since plus N months\n  \
          --since                  since until now\n  \
          --month                  the last N months\n  \
          (nothing)                [history].months, default 6\n\n\
        Examples:\n  churnmap log --full -o history.csv\n  churnmap log --since 2024-01-01 --month 3")]
    Log {
        /// Repository path (default: current directory)
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,

        /// Branch or revision to walk (default: [history].branch)
        #[arg(short, long)]
        branch: Option<String>,

        /// First day of the window (YYYY-MM-DD)
        #[arg(short, long)]
        since: Option<String>,

        /// Day after the window ends (YYYY-MM-DD)
        #[arg(short, long)]
        until: Option<String>,

        /// Window length in months
        #[arg(short, long)]
        month: Option<u32>,

        /// Capture per-file detail
        #[arg(short, long)]
        full: bool,

        /// Write CSV here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Summary statistics for exported history
    #[command(long_about = "Summary statistics for exported history.\n\n\
        Reports total changed lines, net added lines, the refactor ratio\n\
        (1 - added / lines), the Gini coefficient of per-period line volume,\n\
        and descriptive statistics of the resampled periods.\n\n\
        Examples:\n  churnmap info -i history.csv\n  churnmap info -i a.csv -i b.csv --timeslot 1M")]
    Info {
        #[command(flatten)]
        input: InputArgs,

        /// Resampling period such as 2W, 7D, 1M (default: [report].timeslot)
        #[arg(short, long)]
        timeslot: Option<String>,
    },
    /// Rank files by recency-weighted change
    #[command(long_about = "Rank files by recency-weighted change.\n\n\
        Each change contributes a logistic recency weight times log10 of its\n\
        changed lines; very small and very large changes are trimmed first.\n\
        Requires an export made with `log --full`.\n\n\
        Examples:\n  churnmap hotspot -i history.csv --num 10\n  churnmap hotspot -i history.csv --csv > hotspots.csv")]
    Hotspot {
        #[command(flatten)]
        input: InputArgs,

        /// Rows to show (default: [report].top)
        #[arg(short, long)]
        num: Option<usize>,

        /// Write every row as CSV
        #[arg(long)]
        csv: bool,
    },
    /// Build the co-change graph of files that change together
    #[command(long_about = "Build the co-change graph of files that change together.\n\n\
        Mines frequently co-changed file sets, links every pair inside them, and\n\
        annotates files with hotspot score, PageRank, and community. Mining is\n\
        time-boxed; on timeout the support threshold is raised and mining retried.\n\
        Requires an export made with `log --full`.\n\n\
        Examples:\n  churnmap hotgraph -i history.csv\n  churnmap hotgraph -i history.csv --rank 30 --stop-retry")]
    Hotgraph {
        #[command(flatten)]
        input: InputArgs,

        /// Rank of the file anchoring the support threshold (default: [hotgraph].rank)
        #[arg(short, long)]
        rank: Option<usize>,

        /// Mine once without a time limit
        #[arg(long)]
        stop_retry: bool,

        /// Write the edge list as CSV
        #[arg(long)]
        csv: bool,
    },
    /// Resampled activity and the Lorenz curve of line volume
    Timeline {
        #[command(flatten)]
        input: InputArgs,

        /// Resampling period such as 2W, 7D, 1M (default: [report].timeslot)
        #[arg(short, long)]
        timeslot: Option<String>,
    },
    /// Weekly commit counts per author
    Author {
        #[command(flatten)]
        input: InputArgs,

        /// Authors broken out individually (default: [report].authors_top)
        #[arg(short, long)]
        top: Option<usize>,

        /// Break out exactly these authors
        #[arg(long, num_args = 1..)]
        only: Vec<String>,

        /// Skip authors matching these globs, e.g. '*[bot]'
        #[arg(long, num_args = 1..)]
        ignore_authors: Vec<String>,

        /// Show each week as shares of its total
        #[arg(long)]
        ratio: bool,
    },
    /// Create a default .churnmap.toml configuration file
    #[command(long_about = "Create a default .churnmap.toml configuration file.\n\n\
        Writes every option with its default value, commented out.\n\
        Fails if .churnmap.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const DEFAULT_CONFIG: &str = r#"# churnmap configuration

[history]
# branch = "HEAD"
# months = 6
# full = false

[hotspot]
# window_months = 12
# steepness = 12.0
# lower_percentile = 0.5
# upper_percentile = 99.5

[hotgraph]
# rank = 70
# timeout_secs = 10
# max_attempts = 5
# growth_rate = 1.3
# min_threshold = 3

[filter]
# allow = ["*"]
# deny = ["*.lock", "vendor/*"]

[report]
# timeslot = "2W"
# top = 30
# authors_top = 10
"#;

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ChurnmapConfig> {
    let config = match path {
        Some(path) => ChurnmapConfig::from_file(path)?,
        None => {
            let default_path = Path::new(".churnmap.toml");
            if default_path.exists() {
                ChurnmapConfig::from_file(default_path)?
            } else {
                ChurnmapConfig::default()
            }
        }
    };
    Ok(config)
}

fn spinner(message: &'static str) -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_style(
        indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

fn file_filter(config: &FilterConfig, input: &InputArgs) -> Result<GlobFilter> {
    let allow = if input.allow_files.is_empty() {
        config.allow.clone()
    } else {
        input.allow_files.clone()
    };
    let mut deny = config.deny.clone();
    deny.extend(input.ignore_files.iter().cloned());
    Ok(GlobFilter::new(&allow, &deny)?)
}

fn read_input(input: &InputArgs) -> Result<CommitTable> {
    let table = CommitTable::read_csvs(input.inputs.as_slice())?;
    info!(commits = table.len(), files = input.inputs.len(), "loaded history");
    Ok(table)
}

fn require_detail(table: &CommitTable) -> Result<()> {
    if !table.is_empty() && !table.has_detail() {
        miette::bail!(miette::miette!(
            help = "Re-export the history with `churnmap log --full`",
            "The input has no per-file detail"
        ));
    }
    Ok(())
}

fn resolve_timeslot(flag: Option<&str>, config: &ChurnmapConfig) -> Result<Timeslot> {
    Ok(flag.unwrap_or(&config.report.timeslot).parse::<Timeslot>()?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn print_statistics(stats: &Statistics, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(stats)?,
        OutputFormat::Markdown => {
            println!("# History Summary\n");
            println!("- **Lines changed:** {}", stats.lines);
            println!("- **Lines added (net):** {}", stats.added);
            println!("- **Refactor ratio:** {:.3}", stats.refactor);
            println!("- **Gini:** {:.3}", stats.gini);
            println!("- **Periods:** {} x {}\n", stats.buckets, stats.timeslot);
            println!("| Column | Mean | Std | Min | 25% | 50% | 75% | Max |");
            println!("|--------|------|-----|-----|-----|-----|-----|-----|");
            for (name, s) in &stats.describe {
                println!(
                    "| {name} | {:.1} | {:.1} | {:.0} | {:.1} | {:.1} | {:.1} | {:.0} |",
                    s.mean, s.std, s.min, s.p25, s.p50, s.p75, s.max
                );
            }
        }
        OutputFormat::Text => {
            println!("Lines changed:    {}", stats.lines);
            println!("Lines added:      {}", stats.added);
            println!("Refactor ratio:   {:.3}", stats.refactor);
            println!("Gini:             {:.3}", stats.gini);
            println!("Periods:          {} x {}\n", stats.buckets, stats.timeslot);
            println!(
                "{:<11} {:>10} {:>10} {:>8} {:>8} {:>8} {:>8} {:>8}",
                "column", "mean", "std", "min", "25%", "50%", "75%", "max"
            );
            for (name, s) in &stats.describe {
                println!(
                    "{name:<11} {:>10.1} {:>10.1} {:>8.0} {:>8.1} {:>8.1} {:>8.1} {:>8.0}",
                    s.mean, s.std, s.min, s.p25, s.p50, s.p75, s.max
                );
            }
        }
    }
    Ok(())
}

fn write_hotspot_csv(entries: &[HotspotEntry]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout().lock());
    wtr.write_record([
        "file_name",
        "hotspot",
        "commits",
        "authors",
        "edit_rate",
        "insertions",
        "deletions",
        "lines",
    ])
    .into_diagnostic()?;
    for h in entries {
        wtr.write_record([
            h.file_name.clone(),
            h.hotspot.to_string(),
            h.commits.to_string(),
            h.authors.to_string(),
            h.edit_rate.to_string(),
            h.insertions.to_string(),
            h.deletions.to_string(),
            h.lines.to_string(),
        ])
        .into_diagnostic()?;
    }
    wtr.flush().into_diagnostic()?;
    Ok(())
}

fn print_hotspots(entries: &[HotspotEntry], limit: usize, format: OutputFormat) -> Result<()> {
    let top: Vec<&HotspotEntry> = entries.iter().take(limit).collect();
    match format {
        OutputFormat::Json => print_json(&top)?,
        OutputFormat::Markdown => {
            println!("# Hotspots\n");
            if top.is_empty() {
                println!("No hotspots detected.");
                return Ok(());
            }
            println!("| Rank | File | Hotspot | Commits | Authors | Edit rate | Lines |");
            println!("|------|------|---------|---------|---------|-----------|-------|");
            for (i, h) in top.iter().enumerate() {
                println!(
                    "| {} | `{}` | {:.3} | {} | {} | {:.2} | {} |",
                    i + 1,
                    h.file_name,
                    h.hotspot,
                    h.commits,
                    h.authors,
                    h.edit_rate,
                    h.lines
                );
            }
        }
        OutputFormat::Text => {
            if top.is_empty() {
                println!("No hotspots detected.");
                return Ok(());
            }
            println!(
                "{:>4}  {:>8}  {:>7}  {:>7}  {:>9}  file",
                "rank", "hotspot", "commits", "authors", "edit rate"
            );
            for (i, h) in top.iter().enumerate() {
                println!(
                    "{:>4}  {:>8.3}  {:>7}  {:>7}  {:>9.2}  {}",
                    i + 1,
                    h.hotspot,
                    h.commits,
                    h.authors,
                    h.edit_rate,
                    h.file_name
                );
            }
        }
    }
    Ok(())
}

fn write_edge_csv(report: &HotgraphReport) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout().lock());
    wtr.write_record(["source", "target", "weight", "itemsets"])
        .into_diagnostic()?;
    for e in report.graph.edges() {
        wtr.write_record([
            e.source.clone(),
            e.target.clone(),
            e.weight.to_string(),
            e.itemsets.to_string(),
        ])
        .into_diagnostic()?;
    }
    wtr.flush().into_diagnostic()?;
    Ok(())
}

fn print_hotgraph(report: &HotgraphReport, format: OutputFormat) -> Result<()> {
    let graph = &report.graph;
    let outcome = &report.outcome;
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Markdown => {
            println!("# Co-change Graph\n");
            println!(
                "- **Files:** {}\n- **Links:** {}\n- **Support threshold:** {} (started at {}, {} attempt(s){})\n",
                graph.node_count(),
                graph.edge_count(),
                outcome.threshold,
                report.initial_threshold,
                outcome.attempts,
                if outcome.timed_out { ", timed out" } else { "" }
            );
            if graph.is_empty() {
                println!("No co-change patterns found.");
                return Ok(());
            }
            println!("## Files\n");
            println!("| File | Hotspot | PageRank | Community | Degree |");
            println!("|------|---------|----------|-----------|--------|");
            for n in graph.ranked_nodes() {
                println!(
                    "| `{}` | {:.3} | {:.4} | {} | {} |",
                    n.file_name, n.hotspot, n.pagerank, n.community_id, n.degree
                );
            }
            println!("\n## Links\n");
            println!("| File A | File B | Commits | Itemsets |");
            println!("|--------|--------|---------|----------|");
            for e in graph.edges() {
                println!(
                    "| `{}` | `{}` | {} | {} |",
                    e.source, e.target, e.weight, e.itemsets
                );
            }
        }
        OutputFormat::Text => {
            println!(
                "{} files, {} links, threshold {} (started at {}, {} attempt(s){})",
                graph.node_count(),
                graph.edge_count(),
                outcome.threshold,
                report.initial_threshold,
                outcome.attempts,
                if outcome.timed_out { ", timed out" } else { "" }
            );
            if graph.is_empty() {
                println!("No co-change patterns found.");
                return Ok(());
            }
            println!(
                "\n{:>8}  {:>8}  {:>9}  {:>6}  file",
                "hotspot", "pagerank", "community", "degree"
            );
            for n in graph.ranked_nodes() {
                println!(
                    "{:>8.3}  {:>8.4}  {:>9}  {:>6}  {}",
                    n.hotspot, n.pagerank, n.community_id, n.degree, n.file_name
                );
            }
            println!("\nCommunities:");
            for (id, files) in graph.communities() {
                println!("  [{id}] {}", files.join(", "));
            }
            println!("\nLinks:");
            for e in graph.edges() {
                println!("  {} <-> {} ({} commits)", e.source, e.target, e.weight);
            }
        }
    }
    Ok(())
}

fn print_timeline(table: &CommitTable, slot: Timeslot, format: OutputFormat) -> Result<()> {
    let buckets = resample(table, slot);
    let lines: Vec<f64> = buckets.iter().map(|b| b.lines as f64).collect();
    let curve = lorenz(&lines);
    let gini = churnmap_history::analytics::gini(&lines);

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "timeslot": slot.to_string(),
            "label": slot.label(),
            "gini": gini,
            "buckets": buckets,
            "lorenz": curve,
        }))?,
        OutputFormat::Markdown => {
            println!("# Timeline ({})\n", slot.label());
            println!("| Start | Commits | Insertions | Deletions | Lines | Files | Authors |");
            println!("|-------|---------|------------|-----------|-------|-------|---------|");
            for b in &buckets {
                println!(
                    "| {} | {} | {} | {} | {} | {} | {} |",
                    b.start, b.commits, b.insertions, b.deletions, b.lines, b.files, b.authors
                );
            }
            println!("\n**Gini:** {gini:.3}\n");
            println!("| Percentile | Share of lines |");
            println!("|------------|----------------|");
            for p in &curve {
                println!("| {:.0} | {:.1}% |", p.percentile, p.share);
            }
        }
        OutputFormat::Text => {
            println!(
                "{:<10}  {:>7}  {:>10}  {:>9}  {:>8}  {:>5}  {:>7}",
                "start", "commits", "insertions", "deletions", "lines", "files", "authors"
            );
            for b in &buckets {
                println!(
                    "{:<10}  {:>7}  {:>10}  {:>9}  {:>8}  {:>5}  {:>7}",
                    b.start.to_string(),
                    b.commits,
                    b.insertions,
                    b.deletions,
                    b.lines,
                    b.files,
                    b.authors
                );
            }
            println!("\nGini ({}): {gini:.3}", slot.label());
            let points: Vec<String> = curve
                .iter()
                .map(|p| format!("{:.0}:{:.1}", p.percentile, p.share))
                .collect();
            println!("Lorenz: {}", points.join(" "));
        }
    }
    Ok(())
}

fn print_authors(activity: &AuthorActivity, ratio: bool, format: OutputFormat) -> Result<()> {
    let ratios = activity.ratios();
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "columns": activity.columns,
            "weeks": activity.weeks,
            "ratios": ratios,
            "totals": activity.totals(),
        }))?,
        OutputFormat::Markdown | OutputFormat::Text => {
            let mut out = std::io::stdout().lock();
            let header: Vec<String> = std::iter::once("week".to_string())
                .chain(activity.columns.iter().cloned())
                .collect();
            if format == OutputFormat::Markdown {
                writeln!(out, "# Weekly Commits by Author\n").into_diagnostic()?;
            }
            writeln!(out, "{}", format.row(&header)).into_diagnostic()?;
            if let Some(rule) = format.rule(header.len()) {
                writeln!(out, "{rule}").into_diagnostic()?;
            }
            for (week, shares) in activity.weeks.iter().zip(&ratios) {
                let cells: Vec<String> = if ratio {
                    shares.iter().map(|s| format!("{s:.2}")).collect()
                } else {
                    week.counts.iter().map(u64::to_string).collect()
                };
                let row: Vec<String> = std::iter::once(week.start.to_string()).chain(cells).collect();
                writeln!(out, "{}", format.row(&row)).into_diagnostic()?;
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Log {
            ref repo,
            ref branch,
            ref since,
            ref until,
            month,
            full,
            ref output,
        } => {
            if git2::Repository::discover(repo).is_err() {
                miette::bail!(miette::miette!(
                    help = "Run churnmap from inside a git repository, or pass --repo",
                    "Not a git repository: {}",
                    repo.display()
                ));
            }

            let duration = Duration::resolve(
                since.as_deref(),
                until.as_deref(),
                month,
                config.history.months,
            )?;
            let options = IngestOptions {
                branch: Some(branch.clone().unwrap_or_else(|| config.history.branch.clone())),
                duration,
                full: full || config.history.full,
            };
            info!(
                since = %options.duration.since_text(),
                until = %options.duration.until_text(),
                full = options.full,
                "reading history"
            );

            let pb = spinner("Reading history...");
            let mut seen = 0usize;
            let table = ingest_with_progress(repo, &options, |_| {
                seen += 1;
                if let Some(pb) = &pb {
                    pb.set_message(format!("Reading history... {seen} commits"));
                }
            })
            .inspect_err(|_| {
                if let Some(pb) = &pb {
                    pb.finish_with_message("Failed");
                }
            })?;
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }

            match output {
                Some(path) => {
                    table.write_csv_path(path)?;
                    eprintln!("Wrote {} commits to {}", table.len(), path.display());
                }
                None => table.write_csv(std::io::stdout().lock())?,
            }
        }
        Command::Info {
            ref input,
            ref timeslot,
        } => {
            let slot = resolve_timeslot(timeslot.as_deref(), &config)?;
            let filter = file_filter(&config.filter, input)?;
            let table = read_input(input)?.filter_files(&filter);
            print_statistics(&summarize(&table, slot), cli.format)?;
        }
        Command::Hotspot {
            ref input,
            num,
            csv,
        } => {
            let filter = file_filter(&config.filter, input)?;
            let table = read_input(input)?;
            require_detail(&table)?;
            let rows = table.expand_files(Some(&filter));
            let options = HotspotOptions::from(&config.hotspot);
            let entries = detect_hotspots(rows, Utc::now().naive_utc(), &options);

            if csv {
                write_hotspot_csv(&entries)?;
            } else {
                print_hotspots(&entries, num.unwrap_or(config.report.top), cli.format)?;
            }
        }
        Command::Hotgraph {
            ref input,
            rank,
            stop_retry,
            csv,
        } => {
            let filter = file_filter(&config.filter, input)?;
            let table = read_input(input)?;
            require_detail(&table)?;
            let rows = table.expand_files(Some(&filter));
            let hotspots = detect_hotspots(
                rows.clone(),
                Utc::now().naive_utc(),
                &HotspotOptions::from(&config.hotspot),
            );

            let mut options = HotgraphOptions::from(&config.hotgraph);
            options.stop_retry = stop_retry;
            if let Some(rank) = rank {
                options.rank = rank;
            }

            let pb = spinner("Mining co-change patterns...");
            let report = build_hotgraph(&rows, &hotspots, &options);
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }
            if report.outcome.timed_out {
                eprintln!(
                    "Pattern mining timed out {} time(s); try --rank with a smaller value or --stop-retry",
                    report.outcome.attempts
                );
            }

            if csv {
                write_edge_csv(&report)?;
            } else {
                print_hotgraph(&report, cli.format)?;
            }
        }
        Command::Timeline {
            ref input,
            ref timeslot,
        } => {
            let slot = resolve_timeslot(timeslot.as_deref(), &config)?;
            let filter = file_filter(&config.filter, input)?;
            let table = read_input(input)?.filter_files(&filter);
            print_timeline(&table, slot, cli.format)?;
        }
        Command::Author {
            ref input,
            top,
            ref only,
            ref ignore_authors,
            ratio,
        } => {
            let filter = file_filter(&config.filter, input)?;
            let authors = GlobFilter::new(&[], ignore_authors)?;
            let table = read_input(input)?
                .filter_files(&filter)
                .filter_authors(&authors);
            let only = (!only.is_empty()).then_some(only.as_slice());
            let activity =
                AuthorActivity::weekly(&table, top.unwrap_or(config.report.authors_top), only);
            print_authors(&activity, ratio, cli.format)?;
        }
        Command::Init => {
            let path = Path::new(".churnmap.toml");
            if path.exists() {
                miette::bail!(".churnmap.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .churnmap.toml with default configuration");
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "churnmap", &mut std::io::stdout());
        }
    }

    Ok(())
}
