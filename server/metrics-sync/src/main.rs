//! Binary entrypoint: daily sync daemon plus one-shot maintenance commands.

use chrono::NaiveTime;
use clap::{Args, Parser, Subcommand};
use health_engine::RepoKey;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use metrics_sync::config::{DEFAULT_NARRATIVE_BASE_URL, DEFAULT_NARRATIVE_MODEL, DEFAULT_UPSTREAM_BASE_URL};
use metrics_sync::{
  BoundConfig, ChatCompletionsNarrator, HttpMetricSource, MetricsService, NarrativeConfig, Orchestrator,
  PgMetricsStore, ScheduleConfig, Scheduler, SourceConfig,
};

#[derive(Parser, Debug)]
#[command(name = "metrics-sync")]
#[command(about = "OpenHealth repository metrics sync service", long_about = None)]
#[command(version)]
struct Cli {
  /// PostgreSQL connection string
  #[arg(long, env = "DATABASE_URL")]
  database_url: String,

  /// Base URL of the static metric host
  #[arg(long, env = "OPENDIGGER_BASE_URL", default_value = DEFAULT_UPSTREAM_BASE_URL)]
  upstream_url: String,

  /// Per-file upstream request timeout, in seconds
  #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
  upstream_timeout_secs: u64,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run the daily sweep until interrupted
  Daemon {
    /// Local time of day the sweep fires (HH:MM)
    #[arg(long, env = "SYNC_AT", default_value = "02:00", value_parser = parse_time_of_day)]
    sync_at: NaiveTime,
  },
  /// Sync every known repository once (refused while another sweep holds the lock)
  SyncAll,
  /// Sync one repository now
  Sync(RepoArgs),
  /// Start monitoring a repository
  Add(RepoArgs),
  /// Stop monitoring a repository
  Remove(RepoArgs),
  /// Print the health breakdown of a repository
  Health {
    #[command(flatten)]
    repo: RepoArgs,

    /// Also request a narrative analysis
    #[arg(long)]
    narrative: bool,

    #[command(flatten)]
    model: ModelArgs,
  },
}

#[derive(Args, Debug)]
struct RepoArgs {
  /// Hosting platform, e.g. github or gitee
  platform: String,
  owner: String,
  repo: String,
}

impl RepoArgs {
  fn key(&self) -> RepoKey {
    RepoKey::new(&self.platform, &self.owner, &self.repo)
  }
}

#[derive(Args, Debug)]
struct ModelArgs {
  /// API key for the narrative endpoint
  #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
  api_key: Option<String>,

  #[arg(long, env = "NARRATIVE_BASE_URL", default_value = DEFAULT_NARRATIVE_BASE_URL)]
  narrative_url: String,

  #[arg(long, env = "NARRATIVE_MODEL", default_value = DEFAULT_NARRATIVE_MODEL)]
  narrative_model: String,
}

fn parse_time_of_day(s: &str) -> Result<NaiveTime, String> {
  NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("expected HH:MM: {}", e))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
  let mut out = io::stdout().lock();
  serde_json::to_writer_pretty(&mut out, value)?;
  writeln!(out)?;
  Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "metrics_sync=info".into()),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
    .init();

  let cli = Cli::parse();

  let store = PgMetricsStore::connect(&cli.database_url).await?;
  store.ensure_schema().await?;
  let source = HttpMetricSource::new(&SourceConfig {
    base_url: cli.upstream_url,
    request_timeout: Duration::from_secs(cli.upstream_timeout_secs),
  })?;
  let orchestrator = Arc::new(Orchestrator::new(Arc::new(source), Arc::new(store), BoundConfig::default()));
  let service = MetricsService::new(orchestrator.clone());

  match cli.command {
    Command::Daemon { sync_at } => {
      Scheduler::new(orchestrator, ScheduleConfig { sync_at }).run().await;
    }
    Command::SyncAll => {
      let scheduler = Scheduler::new(orchestrator, ScheduleConfig::default());
      print_json(&scheduler.trigger_now().await?)?;
    }
    Command::Sync(repo) => print_json(&orchestrator.sync_repo_metrics(&repo.key()).await?)?,
    Command::Add(repo) => print_json(&service.add_repo(&repo.key()).await?)?,
    Command::Remove(repo) => {
      let deleted = service.remove_repo(&repo.key()).await?;
      print_json(&serde_json::json!({ "deleted": deleted }))?;
    }
    Command::Health {
      repo,
      narrative: false,
      ..
    } => print_json(&service.project_health(&repo.key()).await?)?,
    Command::Health { repo, model, .. } => {
      let narrator = ChatCompletionsNarrator::new(NarrativeConfig {
        base_url: model.narrative_url,
        api_key: model.api_key,
        model: model.narrative_model,
        ..NarrativeConfig::default()
      })?;
      print_json(&service.project_health_report(&repo.key(), &narrator).await?)?;
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;

  #[test]
  fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
  }

  #[test]
  fn time_of_day_parsing() {
    assert_eq!(parse_time_of_day("02:00").unwrap(), NaiveTime::from_hms_opt(2, 0, 0).unwrap());
    assert!(parse_time_of_day("25:00").is_err());
    assert!(parse_time_of_day("2am").is_err());
  }

  #[test]
  fn sync_all_subcommand_parses() {
    let cli = Cli::try_parse_from(["metrics-sync", "--database-url", "postgres://localhost/openhealth", "sync-all"])
      .unwrap();
    assert!(matches!(cli.command, Command::SyncAll));
  }

  #[test]
  fn health_subcommand_parses() {
    let cli = Cli::try_parse_from([
      "metrics-sync",
      "--database-url",
      "postgres://localhost/openhealth",
      "health",
      "github",
      "acme",
      "widget",
      "--narrative",
    ])
    .unwrap();
    match cli.command {
      Command::Health { repo, narrative, .. } => {
        assert!(narrative);
        assert_eq!(repo.key().to_string(), "github/acme/widget");
      }
      other => panic!("unexpected command: {:?}", other),
    }
  }
}
