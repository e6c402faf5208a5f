use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dashmetrics::{Config, Dashboard, Domain, MetricKey, RowSource, Scope, Timeframe, Window};

#[derive(Parser)]
#[command(name = "dashmetrics", about = "Sales and marketing activity metrics CLI")]
struct Cli {
    /// Config file path (default: ~/.dashmetrics/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Anchor date for windows (YYYY-MM-DD, default: today)
    #[arg(long)]
    today: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Totals, rates, XP and level for a member or the whole team
    Snapshot {
        /// Member key or ALL
        #[arg(long, default_value = "ALL")]
        member: String,
        /// Window: 7d, mtd, wtd, latest, all, or a date range
        #[arg(long, default_value = "7d")]
        window: String,
        /// sales or marketing
        #[arg(long, default_value = "sales")]
        domain: String,
        #[arg(long)]
        json: bool,
    },
    /// Actuals against projections
    Targets {
        #[arg(long, default_value = "ALL")]
        member: String,
        /// daily, weekly, or monthly
        #[arg(long, default_value = "daily")]
        timeframe: String,
        #[arg(long, default_value = "sales")]
        domain: String,
        #[arg(long)]
        json: bool,
    },
    /// Consecutive most-recent days at or above the daily target
    Streak {
        #[arg(long, default_value = "ALL")]
        member: String,
        #[arg(long, default_value = "outbound")]
        metric: String,
        #[arg(long)]
        json: bool,
    },
    /// Normalize one exported sheet and print the records
    Normalize {
        /// JSON or CSV export
        file: PathBuf,
        /// analysis, legacy, or raw (default: detect)
        #[arg(long)]
        schema: Option<String>,
        /// Member the rows belong to (default: file name)
        #[arg(long)]
        member: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file path
    Path,
    /// Print the loaded configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let today = match cli.today.as_deref() {
        Some(s) => dashmetrics::date_util::parse_date_str(s)?,
        None => chrono::Local::now().date_naive(),
    };
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };

    match cli.command {
        Commands::Snapshot {
            member,
            window,
            domain,
            json,
        } => {
            let (config, dash) = open_dashboard(&config_path).await?;
            let scope = Scope::parse(&member);
            let window = Window::parse(&window)?;
            let domain = parse_domain(&domain)?;
            let snapshot = dash.snapshot(&scope, &window, domain, today);
            let velocity = dash.velocity(&scope, domain, today);
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!(
                    "Snapshot: {} {} ({})",
                    scope_label(&config, &scope),
                    snapshot.domain,
                    window
                );
                print_snapshot(&snapshot, domain);
                println!("  Velocity: {velocity:+}% week over week");
                println!(
                    "  Combined level: {}",
                    dash.combined_level(&scope, &window, today)
                );
            }
        }
        Commands::Targets {
            member,
            timeframe,
            domain,
            json,
        } => {
            let (config, dash) = open_dashboard(&config_path).await?;
            let scope = Scope::parse(&member);
            let timeframe = Timeframe::parse(&timeframe)?;
            let domain = parse_domain(&domain)?;
            let rows = dash.targets(&scope, timeframe, domain, today);
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                println!(
                    "Targets: {} {domain} ({timeframe})",
                    scope_label(&config, &scope)
                );
                for row in &rows {
                    println!(
                        "  {:<18} {:>10.0} / {:<10.0} {:>6.1}%  {}",
                        row.metric.label(),
                        row.actual,
                        row.target,
                        row.percent,
                        row.status
                    );
                }
                println!("  Say/do ratio: {}%", dash.say_do_ratio(&scope, today));
            }
        }
        Commands::Streak {
            member,
            metric,
            json,
        } => {
            let (config, dash) = open_dashboard(&config_path).await?;
            let scope = Scope::parse(&member);
            let metric = MetricKey::parse(&metric)
                .ok_or_else(|| anyhow::anyhow!("Unknown metric: {metric}"))?;
            let days = dash.streak(&scope, metric);
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "scope": scope, "metric": metric, "streak": days })
                );
            } else {
                println!(
                    "Streak: {} {}: {days} days",
                    scope_label(&config, &scope),
                    metric.label()
                );
            }
        }
        Commands::Normalize {
            file,
            schema,
            member,
            json,
        } => {
            let member = member.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            handle_normalize(&config_path, file, schema.as_deref(), &member, json).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Path => println!("{}", config_path.display()),
            ConfigAction::Show => {
                let config = Config::load(&config_path).await?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        },
    }

    Ok(())
}

async fn open_dashboard(config_path: &Path) -> anyhow::Result<(Config, Dashboard)> {
    let config = Config::load(config_path).await?;
    let dash = Dashboard::open(&config).await?;
    for report in dash.reports() {
        if !report.dropped.is_empty() {
            eprintln!(
                "warning: {} rows dropped for {} (run with -v for details)",
                report.dropped.len(),
                report.member
            );
        }
    }
    Ok((config, dash))
}

fn scope_label(config: &Config, scope: &Scope) -> String {
    match scope {
        Scope::Member(key) => config
            .member(key)
            .map_or_else(|| key.clone(), |m| m.display_name().to_string()),
        Scope::All => scope.to_string(),
    }
}

fn parse_domain(s: &str) -> anyhow::Result<Domain> {
    Domain::parse(s).ok_or_else(|| anyhow::anyhow!("Unknown domain: {s}. Use: sales, marketing"))
}

async fn handle_normalize(
    config_path: &Path,
    file: PathBuf,
    schema: Option<&str>,
    member: &str,
    json: bool,
) -> anyhow::Result<()> {
    // weights come from the config when there is one
    let weights = Config::load_or_default(config_path).await?.xp_weights;
    let mut normalizer = dashmetrics::RowNormalizer::new(member).with_xp_weights(weights);
    if let Some(s) = schema {
        let schema = dashmetrics::RowSchema::parse(s)
            .ok_or_else(|| anyhow::anyhow!("Unknown schema: {s}. Use: analysis, legacy, raw"))?;
        normalizer = normalizer.with_schema(schema);
    }

    let rows = dashmetrics::source::file_source(&file).fetch(member).await?;
    let batch = normalizer.normalize_batch(&rows);

    if json {
        println!("{}", serde_json::to_string_pretty(&batch)?);
        return Ok(());
    }

    println!(
        "Normalized {} ({} records, {} dropped, layout {:?})",
        file.display(),
        batch.records.len(),
        batch.errors.len(),
        batch.schema
    );
    for r in &batch.records {
        println!(
            "  {} {:<8} out {:>4} tri {:>3} appt {:>3} show {:>3} close {:>3} \
             rev {:>9.2} xp {:>7.1}/{:<7.1}",
            r.date,
            r.team_member,
            r.outbound,
            r.triage,
            r.appointments,
            r.shows,
            r.closes,
            r.revenue,
            r.sales_xp,
            r.marketing_xp
        );
    }
    for e in &batch.errors {
        eprintln!("  row {}: {}", e.row, e.message);
    }
    Ok(())
}

fn print_snapshot(s: &dashmetrics::MetricSnapshot, domain: Domain) {
    println!("  Records: {} over {} days", s.record_count, s.day_count);
    match domain {
        Domain::Sales => {
            let t = &s.totals;
            println!("  Activity:");
            println!("    Outbound:     {}", t.outbound);
            println!("    Triage:       {} ({:.1}%)", t.triage, s.rates.conversion_rate);
            println!("    Follow ups:   {}", t.follow_ups);
            println!("    Appointments: {} ({:.1}%)", t.appointments, s.rates.set_rate);
            println!("    Shows:        {} ({:.1}%)", t.shows, s.rates.show_rate);
            println!(
                "    Contracts:    {} ({:.1}%)",
                t.contracts_signed, s.rates.contract_rate
            );
            println!("    Closes:       {} ({:.1}%)", t.closes, s.rates.close_rate);
            println!(
                "    Revenue:      ${:.2} (${:.2}/close)",
                t.revenue, s.rates.revenue_per_close
            );
        }
        Domain::Marketing => {
            let t = &s.totals;
            println!("  Activity:");
            println!("    Outbound msgs: {}", t.outbound_messages);
            println!(
                "    Responses:     {} ({:.1}%)",
                t.positive_responses, s.rates.response_rate
            );
            println!("    Posts:         {}", t.posts_created);
            println!(
                "    Leads:         {} ({:.2}/post)",
                t.leads_generated, s.rates.leads_per_post
            );
        }
    }
    print_progress(s);
}

fn print_progress(s: &dashmetrics::MetricSnapshot) {
    let p = &s.progress;
    println!("  Progress:");
    println!("    XP:        {:.0}", s.total_xp);
    println!(
        "    Level:     {} ({:.0}% to next, {:.0} XP left)",
        s.level, p.level_progress_pct, p.xp_for_next_level
    );
    println!("    Milestone: {:.1}%", p.milestone_pct);
}
