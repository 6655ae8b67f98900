mod age_ranges;
mod config_io;
mod error;
mod models;
mod pipeline;
mod quota;
mod report;
mod roster;
mod sampler;
mod segmenter;
mod splitter;

#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use error::{ImportError, PipelineError, SampleError};
use models::{Config, Dimension, GlobalRule, QuotaEntry};
use pipeline::DesiredSource;
use quota::QuotaSettings;
use std::fs;
use std::path::Path;

const FULL_SAMPLE_FILE_NAME: &str = "muestra_completa.csv";
const PART_FILE_PREFIX: &str = "muestra_parte_";

fn main() -> Result<()> {
    let matches = Command::new("marco-muestral")
        .version("0.1")
        .about("Builds a balanced sample frame from a respondent roster")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("parts")
                .short('p')
                .long("parts")
                .value_name("N")
                .help("Number of parts to split the sample into")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("seed")
                .short('s')
                .long("seed")
                .value_name("SEED")
                .help("Random seed for sampling and splitting")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log output (-v info, -vv debug)")
                .action(ArgAction::Count),
        )
        .get_matches();

    let default_level = match matches.get_count("verbose") {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    // Load or create configuration
    let mut config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)
            .with_context(|| format!("Failed to load configuration: {}", config_file))?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        Config::default().save_to_file(config_file)?;
        println!("⚠️  Please edit {} and set your input file, then run the program again.", config_file);
        return Ok(());
    };
    if let Some(&parts) = matches.get_one::<usize>("parts") {
        config.parts = parts;
    }
    if let Some(&seed) = matches.get_one::<u64>("seed") {
        config.seed = seed;
    }

    if config.parts == 0 {
        println!("❌ Error: parts must be at least 1");
        return Ok(());
    }

    let ranges = age_ranges::parse_age_ranges(&config.age_ranges);
    if ranges.is_empty() {
        println!("❌ Error: no valid age ranges in '{}'", config.age_ranges);
        println!("   Use comma separated start-end pairs, e.g. 18-24,25-34");
        return Ok(());
    }

    let output_dir = config.output_directory.as_deref().unwrap_or("output");
    fs::create_dir_all(output_dir)?;
    clean_output_directory(output_dir)?;

    println!("📂 Reading roster from: {}", config.input_file);
    println!(
        "🎯 Age ranges: {}",
        ranges.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    );
    let roster = roster::load_roster(Path::new(&config.input_file), &ranges)
        .with_context(|| format!("Failed to read roster: {}", config.input_file))?;

    let classified = roster.respondents.iter().filter(|r| r.age_range.is_some()).count();
    println!(
        "   ✅ {} respondents, {} inside the configured age ranges",
        roster.respondents.len(),
        classified
    );
    let out_of_range = roster::out_of_range_count(&roster);
    if out_of_range > 0 {
        println!("   ⚠️  {} respondents have an age outside every range and are excluded", out_of_range);
    }
    for dimension in Dimension::ALL {
        let values = segmenter::distinct_values(&roster, dimension);
        log::info!(
            "{} values: {}",
            dimension.column(),
            values.into_iter().collect::<Vec<_>>().join(", ")
        );
    }

    let imported_quotas = config.quota_file.as_deref().map(import_quotas);
    let source = DesiredSource::from_import(imported_quotas.as_ref(), config.target_total);

    let mut rules = config.rules_file.as_deref().map(import_rules).unwrap_or_default();
    rules.extend(config.rules.iter().cloned());

    let settings = QuotaSettings {
        minimum_cap: config.minimum_cap,
        maximum_cap: config.maximum_cap,
        rules,
    };

    println!("\n🧮 Resolving quotas...");
    let resolution = pipeline::resolve_quotas(&roster, &config.filters, source, &settings);
    for shortfall in &resolution.shortfalls {
        println!(
            "   ⚠️  {} / {} / {} / {}: requested {}, only {} available",
            shortfall.key.zone,
            shortfall.key.gse,
            shortfall.key.age_range,
            shortfall.key.gender,
            shortfall.requested,
            shortfall.available
        );
    }
    println!(
        "   ✅ {} segments, {} cases desired",
        resolution.rows.len(),
        resolution.total_desired()
    );

    if config.export_config {
        config_io::export_config(Path::new(output_dir), &resolution.rows, &settings.rules)?;
        println!("   💾 Quota configuration exported");
    }

    println!("\n🎲 Drawing sample (seed {}, {} parts)...", config.seed, config.parts);
    let frame = match pipeline::build_frame(&roster, &config.filters, &resolution.rows, config.parts, config.seed) {
        Ok(frame) => frame,
        Err(PipelineError::Sample(SampleError::NothingRequested)) => {
            println!("⚠️  No cases requested: every segment has a desired count of zero.");
            println!("   Set target_total, import a quota table or configure caps/rules.");
            return Ok(());
        }
        Err(e) => {
            println!("❌ Error: {}", e);
            return Err(e.into());
        }
    };
    for shortfall in &frame.sample.shortfalls {
        println!(
            "   ⚠️  {} / {} / {} / {}: took all {} available of {} requested",
            shortfall.key.zone,
            shortfall.key.gse,
            shortfall.key.age_range,
            shortfall.key.gender,
            shortfall.available,
            shortfall.requested
        );
    }

    write_sample_files(&roster.headers, &frame, output_dir)?;

    report::write_report(
        Path::new(output_dir),
        &report::ReportData {
            rows: &resolution.rows,
            rules: &settings.rules,
            shortfalls: &resolution.shortfalls,
            part_sizes: &frame.part_sizes(),
            seed: config.seed,
        },
    )?;

    print_summary(&resolution.rows, &frame);

    println!("\n✅ Sample frame complete!");
    println!("📂 Results: {}", output_dir);
    Ok(())
}

fn import_quotas(path: &str) -> Result<Vec<QuotaEntry>, ImportError> {
    println!("📋 Importing quotas from: {}", path);
    let imported = config_io::load_quota_table(Path::new(path));
    match &imported {
        Ok(entries) => println!("   ✅ {} quota rows", entries.len()),
        Err(e) => {
            println!("   ❌ Could not import quotas: {}", e);
            println!("   ⚠️  Falling back to zero desired counts");
        }
    }
    imported
}

fn import_rules(path: &str) -> Vec<GlobalRule> {
    println!("📋 Importing global rules from: {}", path);
    match config_io::load_rules_table(Path::new(path)) {
        Ok(rules) => {
            println!("   ✅ {} rules", rules.len());
            rules
        }
        Err(e) => {
            println!("   ❌ Could not import rules: {}", e);
            Vec::new()
        }
    }
}

fn write_sample_files(
    headers: &csv::StringRecord,
    frame: &pipeline::SampleFrame,
    output_dir: &str,
) -> Result<()> {
    let full_path = Path::new(output_dir).join(FULL_SAMPLE_FILE_NAME);
    roster::save_respondents(
        &full_path,
        headers,
        frame.sample.records.iter().map(|r| &r.respondent),
    )
    .with_context(|| format!("Failed to write {}", full_path.display()))?;

    for (i, part) in frame.parts.iter().enumerate() {
        let part_path = Path::new(output_dir).join(format!("{}{}.csv", PART_FILE_PREFIX, i + 1));
        let written = roster::save_respondents(&part_path, headers, part.iter().map(|r| &r.respondent))
            .with_context(|| format!("Failed to write {}", part_path.display()))?;
        println!("   📄 Part {}: {} records", i + 1, written);
    }

    Ok(())
}

fn print_summary(rows: &[models::QuotaRow], frame: &pipeline::SampleFrame) {
    println!("\n📊 SUMMARY");
    println!("==========\n");

    println!("📍 Desired per zone:");
    for (zone, (available, desired)) in report::totals_by(rows, Dimension::Zone) {
        println!("   {} - {} of {} available", zone, desired, available);
    }

    println!("\n🎯 Sample: {} records", frame.sample.len());
    for (i, size) in frame.part_sizes().iter().enumerate() {
        println!("   {}. {} records", i + 1, size);
    }
}

// Clean up previous results from output directory
fn clean_output_directory(output_dir: &str) -> Result<()> {
    let output_path = Path::new(output_dir);

    if !output_path.exists() {
        return Ok(());
    }

    println!("🧹 Cleaning previous results...");

    let fixed_items = [
        FULL_SAMPLE_FILE_NAME,
        config_io::QUOTA_FILE_NAME,
        config_io::RULES_FILE_NAME,
        report::REPORT_FILE_NAME,
    ];

    for entry in fs::read_dir(output_path)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        let is_part = name.starts_with(PART_FILE_PREFIX) && name.ends_with(".csv");
        if (is_part || fixed_items.contains(&name)) && entry.path().is_file() {
            fs::remove_file(entry.path())?;
            println!("   🗑️  Removed file: {}", name);
        }
    }

    println!("   ✅ Output directory cleaned");
    Ok(())
}
