mod render;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::info;

use tickscope_core::clock::{parse_date_arg, parse_timezone, today_in};
use tickscope_core::snapshot::{CacheSnapshot, Credentials, default_source_path};
use tickscope_core::{
    AppConfig, CaptureOptions, CaptureRules, DedupScope, DedupeOptions, ExitCode,
    build_capture_plan, build_digest, detect_duplicates,
};
use tickscope_remote::{AppliedStats, LiveSnapshot, TickTickClient, apply_capture_plan, apply_dedupe};

use crate::render::ReportMeta;

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "tickscope",
    about = "TickTick digest, duplicate cleanup and WeChat capture organizer",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TickTickSync data.json path (default: auto detect).
    #[arg(long, visible_alias = "config", global = true)]
    source: Option<PathBuf>,

    /// Digest anchor date, YYYY-MM-DD (default: today in --tz).
    #[arg(long, global = true, value_parser = parse_date_arg)]
    date: Option<NaiveDate>,

    /// Digest future window in days.
    #[arg(long, global = true, value_parser = positive_int)]
    days: Option<u32>,

    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Max rows per section in Markdown output.
    #[arg(long, global = true, value_parser = positive_int)]
    limit: Option<u32>,

    /// IANA time zone used for date bucketing.
    #[arg(long, global = true, value_parser = parse_timezone)]
    tz: Option<Tz>,

    /// Dedupe scope: inbox or all.
    #[arg(long, global = true)]
    scope: Option<DedupScope>,

    /// Dedupe window between modification times, in hours.
    #[arg(long, global = true, value_parser = positive_number)]
    window_hours: Option<f64>,

    /// WeChat merge window between creation times, in seconds.
    #[arg(long, global = true, value_parser = positive_number)]
    window_seconds: Option<f64>,

    /// Apply the dedupe/wechat plan instead of a dry run.
    #[arg(long, global = true)]
    apply: bool,

    /// Output in JSON format. Also enabled by setting TICKSCOPE_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Read tasks from the TickTick/Dida API and print a digest.
    Digest,
    /// Detect near-duplicate tasks; delete them with --apply.
    Dedupe,
    /// Merge WeChat-captured split tasks and classify into action/material.
    #[command(visible_alias = "capture")]
    Wechat,
    /// Digest from the local TickTickSync cache, without network access.
    CacheDigest,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Md,
    Json,
}

fn positive_int(s: &str) -> std::result::Result<u32, String> {
    match s.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("{s} is not a positive integer")),
    }
}

fn positive_number(s: &str) -> std::result::Result<f64, String> {
    match s.parse::<f64>() {
        Ok(n) if n.is_finite() && n > 0.0 => Ok(n),
        _ => Err(format!("{s} is not a positive number")),
    }
}

// ─── Settings ───────────────────────────────────────────────────────────────

/// Flags layered over the config file.
struct Settings {
    source: PathBuf,
    timezone: Tz,
    date: Option<NaiveDate>,
    days: u32,
    limit: usize,
    thought_keywords: Vec<String>,
    dedupe: DedupeOptions,
    capture: CaptureOptions,
    rules: CaptureRules,
    apply: bool,
    json: bool,
}

impl Settings {
    fn resolve(cli: &Cli, config: &AppConfig) -> Result<Self> {
        let source = match (&cli.source, &config.source.path) {
            (Some(path), _) => std::path::absolute(path)?,
            (None, Some(path)) => PathBuf::from(path),
            (None, None) => default_source_path()?,
        };
        let timezone = match cli.tz {
            Some(tz) => tz,
            None => parse_timezone(&config.timezone_name())?,
        };
        let json_env = std::env::var("TICKSCOPE_JSON").as_deref() == Ok("1");

        Ok(Self {
            source,
            timezone,
            date: cli.date,
            days: cli.days.unwrap_or(config.digest.days),
            limit: cli.limit.map(|l| l as usize).unwrap_or(config.digest.limit),
            thought_keywords: config.digest.thought_keywords.clone(),
            dedupe: DedupeOptions {
                scope: cli.scope.unwrap_or(config.dedupe.scope),
                window_hours: cli.window_hours.unwrap_or(config.dedupe.window_hours),
            },
            capture: CaptureOptions {
                window_seconds: cli.window_seconds.unwrap_or(config.capture.window_seconds),
            },
            rules: config.capture_rules(),
            apply: cli.apply,
            json: cli.json || json_env || cli.format == Some(OutputFormat::Json),
        })
    }

    fn today(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| today_in(self.timezone))
    }

    fn live_meta(&self, snapshot: &LiveSnapshot) -> ReportMeta {
        ReportMeta {
            source: self.source.display().to_string(),
            base_url: snapshot.base_url.clone(),
            user: snapshot.username.clone(),
            check_point: snapshot.check_point,
            timezone: self.timezone.name().to_string(),
        }
    }
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        std::process::exit(ExitCode::GeneralError as i32);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let start = Instant::now();
    let timing = std::env::var("TICKSCOPE_TIMING").as_deref() == Ok("1");

    let config = AppConfig::load().context("loading config")?;
    let settings = Settings::resolve(&cli, &config)?;

    if timing {
        eprintln!("[timing] config loaded in {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);
    }

    match cli.command.unwrap_or(Commands::Digest) {
        // ── Cache digest ───────────────────────────────────────────────────
        Commands::CacheDigest => {
            let snapshot = CacheSnapshot::from_path(&settings.source)?;
            let tasks = snapshot.normalize(settings.timezone)?;
            info!(source = %settings.source.display(), tasks = tasks.len(), "loaded cache snapshot");
            let digest = build_digest(
                &tasks,
                settings.today(),
                settings.days,
                &settings.thought_keywords,
            );
            let meta = ReportMeta {
                source: settings.source.display().to_string(),
                base_url: snapshot.base_url.clone(),
                user: String::new(),
                check_point: None,
                timezone: settings.timezone.name().to_string(),
            };

            if settings.json {
                print_ok(json!({ "meta": meta, "digest": digest }), start)?;
            } else {
                println!("{}", render::cache_digest_md(&meta, &digest, settings.limit));
            }
        }

        // ── Live digest ────────────────────────────────────────────────────
        Commands::Digest => {
            let (_, snapshot) = fetch_live(&settings, start, timing).await?;
            let meta = settings.live_meta(&snapshot);
            let digest = build_digest(
                &snapshot.tasks,
                settings.today(),
                settings.days,
                &settings.thought_keywords,
            );

            if settings.json {
                print_ok(json!({ "meta": meta, "digest": digest }), start)?;
            } else {
                println!("{}", render::live_digest_md(&meta, &digest, settings.limit));
            }
        }

        // ── Dedupe ─────────────────────────────────────────────────────────
        Commands::Dedupe => {
            let (client, snapshot) = fetch_live(&settings, start, timing).await?;
            let meta = settings.live_meta(&snapshot);
            let groups = detect_duplicates(&snapshot.tasks, &settings.dedupe);
            info!(
                groups = groups.len(),
                scope = %settings.dedupe.scope,
                apply = settings.apply,
                "duplicate groups detected"
            );

            let deleted = if settings.apply {
                apply_dedupe(&client, &groups).await?
            } else {
                0
            };

            if settings.json {
                print_ok(
                    json!({
                        "meta": meta,
                        "apply": settings.apply,
                        "merges": groups,
                        "deletedCount": deleted,
                    }),
                    start,
                )?;
            } else {
                println!("{}", render::dedupe_md(&meta, &groups, settings.apply, deleted));
            }
        }

        // ── WeChat capture ─────────────────────────────────────────────────
        Commands::Wechat => {
            let (client, snapshot) = fetch_live(&settings, start, timing).await?;
            let meta = settings.live_meta(&snapshot);
            let plan = build_capture_plan(&snapshot.tasks, &settings.capture, &settings.rules)?;
            info!(
                captured = plan.captured_count,
                updates = plan.update_tasks.len(),
                deletes = plan.delete_tasks.len(),
                apply = settings.apply,
                "capture plan built"
            );

            let stats = if settings.apply {
                apply_capture_plan(&client, &plan).await?
            } else {
                AppliedStats::default()
            };

            if settings.json {
                print_ok(
                    json!({
                        "meta": meta,
                        "apply": settings.apply,
                        "plan": plan,
                        "appliedStats": stats,
                    }),
                    start,
                )?;
            } else {
                println!("{}", render::capture_md(&meta, &plan, settings.apply, &stats));
            }
        }
    }

    if timing {
        eprintln!("[timing] total {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

async fn fetch_live(
    settings: &Settings,
    start: Instant,
    timing: bool,
) -> Result<(TickTickClient, LiveSnapshot)> {
    if !settings.source.exists() {
        anyhow::bail!("config not found: {}", settings.source.display());
    }
    let credentials = Credentials::from_path(&settings.source)?;
    let client = TickTickClient::new(&credentials)?;
    let snapshot = client.fetch_snapshot(&credentials, settings.timezone).await?;
    info!(user = %snapshot.username, server = %snapshot.base_url, "live snapshot ready");

    if timing {
        eprintln!("[timing] snapshot fetched in {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);
    }
    Ok((client, snapshot))
}

fn print_ok(data: serde_json::Value, start: Instant) -> Result<()> {
    let dur = start.elapsed().as_millis();
    print_json(&json!({ "status": "ok", "data": data, "meta": { "duration_ms": dur } }))
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}
