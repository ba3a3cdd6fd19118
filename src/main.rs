use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use deltacov::cli::{Cli, Commands};
use deltacov::collector::{MultiNodeCollector, StaticNodeDiscovery, TcpClientFactory};
use deltacov::config::CoverageConfig;
use deltacov::report::{ReportGenerator, ReportRequest};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = CoverageConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Collect { app, tag, cluster } => {
            handle_collect(&config, &app, cluster.as_deref(), &tag)
        }
        Commands::Merge { app, tag, cluster } => {
            handle_merge(&config, &app, cluster.as_deref(), &tag)
        }
        Commands::Report {
            app,
            tag,
            cluster,
            base_ref,
            new_ref,
            capture,
            merge_all,
        } => handle_report(
            &config,
            ReportRequest {
                app_name: app,
                cluster_name: cluster,
                tag,
                base_ref,
                new_ref,
                capture_path: capture,
                merge_all,
            },
        ),
        Commands::Prune {
            app,
            tag,
            cluster,
            keep,
        } => handle_prune(&config, &app, cluster.as_deref(), &tag, keep),
        Commands::Reset { app, cluster } => handle_reset(&config, &app, cluster.as_deref()),
    }
}

fn handle_collect(
    config: &CoverageConfig,
    app: &str,
    cluster: Option<&str>,
    tag: &str,
) -> Result<()> {
    let discovery = StaticNodeDiscovery::new(config);
    let collector = MultiNodeCollector::new(config, &discovery, &TcpClientFactory);
    let outcome = collector
        .collect_from_all_nodes(app, cluster, tag)
        .with_context(|| format!("collecting coverage for '{app}'"))?;

    println!(
        "{} {} of {} node(s)",
        "Collected".green().bold(),
        outcome.success_count,
        outcome.total_nodes
    );
    for capture in &outcome.successful_captures {
        println!("  {}", capture.path.display());
    }
    if let Some(fleet) = &outcome.fleet_capture {
        println!("  {} {}", "fleet:".cyan(), fleet.path.display());
    }
    if !outcome.failed_nodes.is_empty() {
        println!(
            "  {} {}",
            "failed nodes:".red(),
            outcome.failed_nodes.join(", ")
        );
    }
    Ok(())
}

fn handle_merge(
    config: &CoverageConfig,
    app: &str,
    cluster: Option<&str>,
    tag: &str,
) -> Result<()> {
    let scope_dir = config.scope_dir(app, cluster, tag);
    let outcome = deltacov::merge_scope_captures(&scope_dir)
        .with_context(|| format!("merging captures for '{app}' tag '{tag}'"))?;

    if outcome.artifact_created {
        println!(
            "{} {} capture(s) into {}",
            "Merged".green().bold(),
            outcome.input_count,
            outcome.capture_path.display()
        );
    } else {
        println!(
            "{} single capture used as-is: {}",
            "Skipped".yellow(),
            outcome.capture_path.display()
        );
    }
    Ok(())
}

fn handle_report(config: &CoverageConfig, request: ReportRequest) -> Result<()> {
    let analyzer = deltacov::XmlReportAnalyzer::from_config(&config.analyzer)?;
    let generator = ReportGenerator::new(config, &analyzer);
    let report = generator
        .generate(&request)
        .with_context(|| format!("generating incremental report for '{}'", request.app_name))?;

    let stats = &report.overall_stats;
    println!("{}", "Incremental coverage".bold());
    println!("  changed lines:  {}", stats.changed_lines);
    println!("  covered:        {}", stats.covered_lines.to_string().green());
    println!("  partial:        {}", stats.partially_covered_lines.to_string().yellow());
    println!("  uncovered:      {}", stats.uncovered_lines.to_string().red());
    println!("  coverage:       {:.2}%", stats.coverage_percentage);
    println!("  report:         {}", report.report_path);
    Ok(())
}

fn handle_prune(
    config: &CoverageConfig,
    app: &str,
    cluster: Option<&str>,
    tag: &str,
    keep: Option<usize>,
) -> Result<()> {
    let keep = keep.unwrap_or(config.retention_keep);
    let scope_dir = config.scope_dir(app, cluster, tag);
    let outcome = deltacov::prune_scope(&scope_dir, keep)
        .with_context(|| format!("pruning captures for '{app}' tag '{tag}'"))?;

    println!(
        "{} {} unmerged, {} merged capture(s) deleted",
        "Pruned".green().bold(),
        outcome.deleted_unmerged,
        outcome.deleted_merged
    );
    if outcome.failed_deletes > 0 {
        println!("  {} {}", "failed deletes:".red(), outcome.failed_deletes);
    }
    Ok(())
}

fn handle_reset(config: &CoverageConfig, app: &str, cluster: Option<&str>) -> Result<()> {
    let discovery = StaticNodeDiscovery::new(config);
    let collector = MultiNodeCollector::new(config, &discovery, &TcpClientFactory);
    let outcome = collector
        .reset_all_nodes(app, cluster)
        .with_context(|| format!("resetting coverage for '{app}'"))?;

    println!(
        "{} {} of {} node(s)",
        "Reset".green().bold(),
        outcome.success_count,
        outcome.total_nodes
    );
    if !outcome.failed_nodes.is_empty() {
        println!(
            "  {} {}",
            "failed nodes:".red(),
            outcome.failed_nodes.join(", ")
        );
    }
    Ok(())
}
