//! Binary entrypoint: read one snapshot JSON object from stdin, write the health breakdown to stdout.

use health_engine::{calculate_project_health, RepoMetricsSnapshot};
use std::io::{self, Read, Write};

fn main() {
  if let Err(e) = run_binary() {
    let _ = writeln!(io::stderr(), "health-engine error: {}", e);
    std::process::exit(1);
  }
}

fn run_binary() -> Result<(), Box<dyn std::error::Error>> {
  let mut raw = String::new();
  io::stdin().lock().read_to_string(&mut raw)?;
  let snapshot: RepoMetricsSnapshot = serde_json::from_str(&raw)?;

  let out = calculate_project_health(&snapshot);
  let json = serde_json::to_vec(&out)?;
  io::stdout().write_all(&json)?;
  Ok(())
}
