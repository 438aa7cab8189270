const VERSION: &str = env!("CARGO_PKG_VERSION");

use clap::Parser;
use ordifig::{matrix::DistanceMatrix, meta, pcoa, plot, stats};
use std::error::Error;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

/// Logger manager supporting dynamic progress display and detailed logging
pub struct Logger {
    writer: BufWriter<std::fs::File>,
    last_progress: String,
}

impl Logger {
    pub fn new(file: std::fs::File) -> Self {
        Self {
            writer: BufWriter::new(file),
            last_progress: String::new(),
        }
    }

    /// Record detailed log information
    pub fn log(&mut self, message: &str) -> std::io::Result<()> {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.writer, "[{}] {}", timestamp, message)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Display dynamic progress information (overwrite previous line)
    pub fn progress(&mut self, message: &str) -> std::io::Result<()> {
        if !self.last_progress.is_empty() {
            print!("\r{}", " ".repeat(self.last_progress.len()));
        }
        print!("\r{}", message);
        std::io::stdout().flush()?;
        self.last_progress = message.to_string();
        Ok(())
    }

    /// Finish progress display
    pub fn finish_progress(&mut self) -> std::io::Result<()> {
        if !self.last_progress.is_empty() {
            println!();
            self.last_progress.clear();
        }
        Ok(())
    }

    /// Record log and display progress simultaneously
    pub fn log_and_progress(&mut self, message: &str) -> std::io::Result<()> {
        self.log(message)?;
        self.progress(message)?;
        Ok(())
    }
}

/// Format time as "xx h xx m xx.xxx s" format
fn format_time_used(elapsed: std::time::Duration) -> String {
    let total_secs = elapsed.as_secs_f64();
    let hours = (total_secs / 3600.0) as u64;
    let minutes = ((total_secs % 3600.0) / 60.0) as u64;
    let seconds = total_secs % 60.0;

    if hours > 0 {
        format!("[Time used] {:02} h {:02} m {:05.3} s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("[Time used] {:02} m {:05.3} s", minutes, seconds)
    } else {
        format!("[Time used] {:05.3} s", seconds)
    }
}

#[derive(Parser)]
#[command(author, version, about = "PCoA ordination and site-distance figure for microbial community dissimilarity matrices", long_about = None)]
struct Cli {
    /// Pairwise distance matrix (.dist, tab-separated)
    #[arg(
        short = 'd',
        long = "dist",
        default_value = "2020-06-09_11-59-06.357078_braycurtis_sample_distances_A_sqrt.dist"
    )]
    pub dist: String,
    /// Sample metadata table (tab-separated, SymPortal meta_only export)
    #[arg(
        short = 'm',
        long = "meta",
        default_value = "109_20200609_2020-06-09_11-59-06.357078.seqs.absolute.meta_only.txt"
    )]
    pub meta: String,
    /// Profile abundance table (tab-separated, SymPortal abund_and_meta export)
    #[arg(
        short = 'p',
        long = "profile",
        default_value = "109_20200609_2020-06-09_11-59-06.357078.profiles.absolute.abund_and_meta.txt"
    )]
    pub profile: String,
    /// Control/blank samples to drop from the matrix and metadata
    #[arg(
        long = "exclude",
        default_value = "S1_H2O,S3_H2O,extraction_neg,milliq_neg",
        value_delimiter = ','
    )]
    pub exclude: Vec<String>,
    /// Profile column whose nonzero samples get the highlight marker
    #[arg(long = "highlight-profile", default_value = "A1")]
    pub highlight_profile: String,
    /// Display site names, northernmost first, one per collection location
    #[arg(
        long = "site-names",
        default_value = "29\u{b0} Gulf of Aqaba,27\u{b0} Duba,Thuwal,Al Lith,Farasan Banks",
        value_delimiter = ','
    )]
    pub site_names: Vec<String>,
    /// Ordination axes to retain (the figure needs at least 3)
    #[arg(long = "axes", default_value_t = 3)]
    pub axes: usize,
    /// Output prefix; writes <prefix>.png and <prefix>.svg
    #[arg(short = 'o', long = "output-prefix", default_value = "s_fig_braycurtis_sqrt")]
    pub output_prefix: String,
    /// Log file path (optional)
    #[arg(short = 'l', long = "log")]
    pub log: Option<String>,
}

/// Validate command arguments
fn validate_args(args: &Cli) -> Result<(), Box<dyn Error>> {
    for (label, path) in [
        ("Distance", &args.dist),
        ("Metadata", &args.meta),
        ("Profile", &args.profile),
    ] {
        if path.trim().is_empty() {
            return Err(format!("Error: {} file path cannot be empty", label).into());
        }
        if !Path::new(path).exists() {
            return Err(format!("Error: {} file does not exist: {}", label, path).into());
        }
    }
    if args.axes < 3 {
        return Err(format!(
            "Error: the figure plots PC1-PC3, need at least 3 axes, current: {}",
            args.axes
        )
        .into());
    }
    if args.site_names.is_empty() {
        return Err("Error: site name list cannot be empty".into());
    }
    if args.output_prefix.trim().is_empty() {
        return Err("Error: output prefix cannot be empty".into());
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    validate_args(&args)?;

    let log_file = if let Some(log_path) = &args.log {
        std::fs::File::create(log_path)?
    } else {
        std::fs::File::create("ordifig.log")?
    };
    let mut logger = Logger::new(log_file);
    let start = Instant::now();

    logger.log("=== ordifig Figure Log ===")?;
    logger.log(&format!("Software Version: v{}", VERSION))?;
    logger.log(&format!(
        "Runtime: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
    ))?;
    logger.log(&format!("Distance File: {}", args.dist))?;
    logger.log(&format!("Metadata File: {}", args.meta))?;
    logger.log(&format!("Profile File: {}", args.profile))?;
    logger.log(&format!("Excluded Samples: {}", args.exclude.join(",")))?;
    logger.log(&format!("Highlight Profile: {}", args.highlight_profile))?;

    logger.log_and_progress("Loading distance matrix...")?;
    let dist = DistanceMatrix::load(&args.dist)?;
    let total = dist.n();
    let dist = dist.drop_samples(&args.exclude)?;
    logger.log_and_progress(&format!(
        "Loaded {} samples, {} retained after exclusion",
        total,
        dist.n()
    ))?;

    logger.log_and_progress("Loading metadata and assigning sites...")?;
    let records = meta::load_metadata(&args.meta, &args.exclude)?;
    let sites = meta::SiteMap::assign(&records, &args.site_names)?;
    for site in &sites.sites {
        logger.log(&format!(
            "Site '{}' ({}): {} samples",
            site.name,
            site.key,
            site.samples.len()
        ))?;
    }

    let highlighted = meta::load_highlight_samples(&args.profile, &args.highlight_profile)?;
    // Keep ordination order and drop highlighted samples not in the matrix.
    let highlighted: Vec<String> = dist
        .labels()
        .iter()
        .filter(|l| highlighted.contains(*l))
        .cloned()
        .collect();
    logger.log(&format!(
        "{} samples carry the {} profile",
        highlighted.len(),
        args.highlight_profile
    ))?;

    logger.log_and_progress("Running principal coordinates analysis...")?;
    let ordination = pcoa::pcoa(&dist, args.axes)?;
    if ordination.n_axes() < 3 {
        return Err(format!(
            "Error: only {} ordination axes available from {} samples; the figure needs 3",
            ordination.n_axes(),
            dist.n()
        )
        .into());
    }
    logger.log(&format!(
        "Proportion explained: PC1 {:.4}, PC2 {:.4}, PC3 {:.4}",
        ordination.proportion_explained[0],
        ordination.proportion_explained[1],
        ordination.proportion_explained[2]
    ))?;

    logger.log_and_progress("Computing site distance statistics...")?;
    let site_stats = stats::site_distance_stats(&dist, &sites)?;
    logger.log(&format!(
        "Site distance table: {} rows x {} columns ({})",
        site_stats.n_sites(),
        site_stats.column_names().len(),
        site_stats.column_names().join(", ")
    ))?;

    let png_path = format!("{}.png", args.output_prefix);
    let svg_path = format!("{}.svg", args.output_prefix);
    logger.log_and_progress(&format!("Rendering {} and {}...", png_path, svg_path))?;
    plot::render_figure(&ordination, &sites, &highlighted, &site_stats, &png_path, &svg_path)?;

    logger.finish_progress()?;
    logger.log(&format_time_used(start.elapsed()))?;
    println!("{}", format_time_used(start.elapsed()));
    Ok(())
}
