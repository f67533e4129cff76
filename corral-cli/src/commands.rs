// SPDX-License-Identifier: AGPL-3.0-or-later
//! CLI command implementations

use chrono::{DateTime, Utc};
use console::style;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tabled::{Table, Tabled};

use corral_cache::Partition;
use corral_core::{CorralError, CorralResult, Method, RequestDescriptor};
use corral_sync::{MutationStatus, PendingMutation};
use corral_worker::{CacheSyncManager, HttpFetcher, WorkerConfig};

/// Global flags shared by every command
pub struct Context {
    pub config: Option<PathBuf>,
    pub base_url: Option<String>,
}

/// Load configuration and open the worker database
fn open(ctx: &Context) -> CorralResult<CacheSyncManager> {
    let config = WorkerConfig::load_or_default(ctx.config.as_deref())?;
    let fetcher = Arc::new(HttpFetcher::new(
        Duration::from_secs(config.request_timeout_secs),
        ctx.base_url.clone(),
    )?);
    CacheSyncManager::new(config, fetcher)
}

/// Format a timestamp for display
fn format_time(dt: Option<DateTime<Utc>>) -> String {
    dt.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_status(status: MutationStatus) -> String {
    match status {
        MutationStatus::Pending => style("pending").yellow().to_string(),
        MutationStatus::Syncing => style("syncing").cyan().to_string(),
        MutationStatus::Synced => style("synced").green().to_string(),
        MutationStatus::Failed => style("failed").red().to_string(),
    }
}

/// Pre-cache the app shell, optionally activating right away
pub async fn install(ctx: &Context, activate: bool) -> CorralResult<()> {
    let manager = open(ctx)?;

    let report = manager.handle_install().await?;
    for url in &report.cached {
        println!("{} {url}", style("cached").green());
    }
    for url in &report.failed {
        println!("{} {url}", style("failed").red());
    }
    println!(
        "Installed: {} cached, {} failed",
        report.cached.len(),
        report.failed.len()
    );

    if activate {
        let report = manager.handle_activate().await?;
        println!("Activated, {} stale generation(s) dropped", report.dropped.len());
    }

    manager.flush()
}

/// Install the current generation, then retire every stale one
pub async fn activate(ctx: &Context) -> CorralResult<()> {
    let manager = open(ctx)?;

    let install = manager.handle_install().await?;
    if !install.failed.is_empty() {
        eprintln!(
            "{} {} precache entries unreachable",
            style("warning:").yellow(),
            install.failed.len()
        );
    }

    let report = manager.handle_activate().await?;
    for name in &report.dropped {
        println!("{} {name}", style("dropped").red());
    }
    println!("Activated, {} stale generation(s) dropped", report.dropped.len());

    manager.flush()
}

/// Show cache and queue statistics
pub async fn stats(ctx: &Context) -> CorralResult<()> {
    let manager = open(ctx)?;
    let stats = manager.stats().await?;

    println!("{}", style("Cache").bold());
    println!("  state:             {}", stats.state);
    println!("  static entries:    {}", stats.cache.static_entries);
    println!("  api entries:       {}", stats.cache.api_entries);
    println!("  stale generations: {}", stats.cache.stale_generations);
    println!(
        "  disk usage:        {}",
        bytesize::ByteSize(stats.cache.disk_bytes)
    );

    println!("{}", style("Queue").bold());
    println!("  pending: {}", stats.queue.pending);
    println!("  syncing: {}", stats.queue.syncing);
    println!("  synced:  {}", stats.queue.synced);
    println!("  failed:  {}", stats.queue.failed);

    Ok(())
}

/// List cache generations, marking the current ones
pub async fn generations(ctx: &Context) -> CorralResult<()> {
    let manager = open(ctx)?;
    let store = manager.store();

    let current: Vec<String> = Partition::ALL
        .iter()
        .map(|p| store.generation_name(*p))
        .collect();

    let generations = store.generations();
    if generations.is_empty() {
        println!("(no generations)");
        return Ok(());
    }

    for name in generations {
        if current.contains(&name) {
            println!("{} {}", style("*").green(), name);
        } else {
            println!("  {name}");
        }
    }

    Ok(())
}

#[derive(Tabled)]
struct QueueRow {
    #[tabled(rename = "Seq")]
    seq: u64,
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Attempts")]
    attempts: u32,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Last error")]
    error: String,
}

impl QueueRow {
    fn from(m: &PendingMutation) -> Self {
        Self {
            seq: m.seq,
            id: m.id.to_string()[..8].to_string(),
            status: format_status(m.status),
            target: m.target.to_string(),
            attempts: m.attempt_count,
            created: format_time(Some(m.created_at)),
            error: m.last_error.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// List queued mutations in replay order
pub async fn queue_ls(ctx: &Context) -> CorralResult<()> {
    let manager = open(ctx)?;

    let entries = manager.queue().all()?;
    if entries.is_empty() {
        println!("(queue is empty)");
        return Ok(());
    }

    let rows: Vec<QueueRow> = entries.iter().map(QueueRow::from).collect();
    println!("{}", Table::new(rows));
    Ok(())
}

/// Replay pending mutations against the server
pub async fn queue_replay(ctx: &Context) -> CorralResult<()> {
    let manager = open(ctx)?;

    let report = manager.handle_sync_trigger().await?;
    if report.skipped {
        println!("Replay already in progress, nothing done");
        return Ok(());
    }
    if report.attempted == 0 {
        println!("Nothing pending");
        return Ok(());
    }

    println!(
        "Attempted {}: {} synced, {} requeued, {} failed",
        report.attempted,
        style(report.synced.len()).green(),
        style(report.requeued.len()).yellow(),
        style(report.failed.len()).red()
    );

    manager.flush()
}

/// Purge synced (and optionally failed) queue entries
pub async fn queue_purge(ctx: &Context, failed: bool) -> CorralResult<()> {
    let manager = open(ctx)?;

    let mut purged = manager.queue().purge_synced()?;
    if failed {
        purged += manager.queue().purge_failed()?;
    }
    println!("Purged {purged} entr{}", if purged == 1 { "y" } else { "ies" });

    manager.flush()
}

/// Remove every entry from the current cache generation
pub async fn clear(ctx: &Context) -> CorralResult<()> {
    let manager = open(ctx)?;
    manager.store().clear()?;
    println!("Cache cleared");
    manager.flush()
}

/// Fetch a URL through the caching strategies
pub async fn fetch(ctx: &Context, url: &str, method: &str, data: Option<&str>) -> CorralResult<()> {
    let manager = open(ctx)?;

    let method = Method::from_str(method).map_err(CorralError::Other)?;
    let mut request = RequestDescriptor::new(method, url);
    if let Some(body) = data {
        request = request
            .with_header("content-type", "application/json")
            .with_body(body.as_bytes().to_vec());
    }

    let response = manager.handle_fetch(&request).await?;

    let status_label = if response.is_success() {
        style(response.status).green()
    } else {
        style(response.status).red()
    };
    eprintln!("{status_label} {url}");
    if response.is_offline_synthesized() {
        eprintln!("{}", style("(synthesized offline response)").dim());
    }

    use std::io::Write;
    std::io::stdout()
        .write_all(&response.body)
        .map_err(CorralError::Io)?;
    println!();

    manager.flush()
}
