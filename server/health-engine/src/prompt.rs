//! Deterministic analysis prompt for the narrative generator.
//!
//! Same snapshot + breakdown always yields the same text, so callers can assert on it.

use std::fmt::Write;

use crate::health::HealthScoreBreakdown;
use crate::score;
use crate::types::{MetricSeries, RepoMetricsSnapshot};

/// Marker the model is asked to end its answer with, e.g. `<!--score:85-->`.
pub const SCORE_MARKER_EXAMPLE: &str = "<!--score:90-->";

const CORE_MEMBER_LIMIT: usize = 20;

const SCORING_LOGIC: &str = "\
Scoring logic:

1. Activity (30% of the overall score):
- Commit frequency (40%): log of the average monthly commit count; 10 commits a month scores about 42, 100 scores 80.
- Issue activity (30%): new issues (30%) and closed issues (30%) by log of monthly volume, response time (20%) and resolution time (20%), shorter is better.
- Pull request activity (30%): opened (30%) and merged (30%) by log of monthly volume, response time (20%) and processing time (20%), shorter is better.

2. Community health (30% of the overall score):
- Contributors (40%): log of average monthly active contributors.
- Issue response speed (30%): log decay of response time.
- Pull request processing speed (30%): log decay of resolution duration.

3. Code quality (20% of the overall score): fixed baseline of 70 for now.

4. Documentation (20% of the overall score): fixed baseline of 70 for now.

All time-based scores use logarithmic decay to limit the influence of extreme values.
";

const ANALYSIS_REQUEST: &str = "\
Based on the data above, analyse the project along these lines:

1. Health summary: overall assessment, performance per dimension (activity, community health, OpenRank), notable strengths and problems.
2. Trends: activity over time, community growth, OpenRank trajectory, outlook.
3. Community influence: OpenRank-based influence, core contributors, community structure.
4. Problem diagnosis: main current problems, their causes, their severity.
5. Recommendations in priority order: short term (1-3 months), medium term (3-6 months), long term (6+ months).
6. Sustainability: contributor turnover, dependence on core maintainers, link between activity and influence, long-term potential.

For every recommendation give the expected effect, the resources needed, the difficulty and concrete steps.

Finally give your own score with the reasoning behind it, weighing the project's OpenRank performance as a measure of its influence in the open source ecosystem.
Also append the score as a comment at the very end of the answer, without spaces inside the comment, for example: ";

fn fmt_value(v: f64) -> String {
  if v.fract() == 0.0 && v.abs() < 1e15 {
    format!("{}", v as i64)
  } else {
    format!("{:.2}", v)
  }
}

/// `2024-01: 3, 2024-02: 5` over the last `n` months, or `no data`.
fn trend(series: Option<&MetricSeries>, n: usize) -> String {
  match series {
    Some(s) if !s.is_empty() => s
      .latest(n)
      .into_iter()
      .map(|(month, v)| format!("{}: {}", month, fmt_value(v)))
      .collect::<Vec<_>>()
      .join(", "),
    _ => "no data".to_string(),
  }
}

fn total(series: Option<&MetricSeries>) -> String {
  fmt_value(series.map_or(0.0, MetricSeries::sum))
}

/// Build the full prompt text.
pub fn build_analysis_prompt(snapshot: &RepoMetricsSnapshot, health: &HealthScoreBreakdown) -> String {
  let issues = snapshot.issues.as_ref();
  let prs = snapshot.pull_requests.as_ref();
  let contributors = snapshot.contributors.as_ref();
  let code = snapshot.code_changes.as_ref();
  let attention = snapshot.attention.as_ref();
  let d = &health.details;

  let mut out = String::new();
  out.push_str(SCORING_LOGIC);

  // write! into a String cannot fail.
  let _ = writeln!(out, "\nProject: {}", snapshot.key);
  let _ = writeln!(out, "\nHealth scores:");
  let _ = writeln!(out, "- Overall: {:.1}/100", health.overall_score);
  let _ = writeln!(out, "- Activity: {:.1}/100", health.activity_score);
  let _ = writeln!(out, "  * Commit frequency: {:.1}/100", d.activity.commit_frequency);
  let _ = writeln!(
    out,
    "  * Issue activity: {:.1}/100 (new {:.1}, closed {:.1}, response {:.1}, resolution {:.1})",
    d.activity.issue_activity,
    d.activity.issues.opened,
    d.activity.issues.closed,
    d.activity.issues.response,
    d.activity.issues.resolution
  );
  let _ = writeln!(
    out,
    "  * Pull request activity: {:.1}/100 (opened {:.1}, merged {:.1}, response {:.1}, processing {:.1})",
    d.activity.pr_activity,
    d.activity.pull_requests.opened,
    d.activity.pull_requests.closed,
    d.activity.pull_requests.response,
    d.activity.pull_requests.resolution
  );
  let _ = writeln!(out, "- Community health: {:.1}/100", health.community_score);
  let _ = writeln!(out, "  * Contributors: {:.1}/100", d.community.contributor_score);
  let _ = writeln!(out, "  * Issue response speed: {:.1}/100", d.community.issue_response_score);
  let _ = writeln!(out, "  * Pull request processing speed: {:.1}/100", d.community.pr_processing_score);
  let _ = writeln!(out, "- Code quality: {:.1}/100", health.code_quality_score);
  let _ = writeln!(out, "- Documentation: {:.1}/100", health.documentation_score);

  let _ = writeln!(out, "\nDetailed data:");
  let _ = writeln!(out, "\n1. Activity:");
  let _ = writeln!(out, "- Monthly activity (last 12 months): {}", trend(snapshot.activity.as_ref(), 12));
  let _ = writeln!(
    out,
    "- Issues: {} opened, {} closed",
    total(issues.and_then(|m| m.new.as_ref())),
    total(issues.and_then(|m| m.closed.as_ref()))
  );
  let _ = writeln!(
    out,
    "- Pull requests: {} opened, {} merged",
    total(prs.and_then(|m| m.change_requests.as_ref())),
    total(prs.and_then(|m| m.accepted.as_ref()))
  );

  let _ = writeln!(out, "\n2. Community:");
  let _ = writeln!(
    out,
    "- Average monthly active contributors: {:.2}",
    score::avg_monthly_contributors(contributors.and_then(|c| c.contributors.as_ref()))
  );
  let _ = writeln!(
    out,
    "- Issue response time (last 3 months): {}",
    trend(issues.and_then(|m| m.response_time.as_ref()), 3)
  );
  let _ = writeln!(
    out,
    "- Pull request resolution time (last 3 months): {}",
    trend(prs.and_then(|m| m.resolution_duration.as_ref()), 3)
  );

  let _ = writeln!(out, "\n3. Attention:");
  let _ = writeln!(out, "- Stars (last 3 months): {}", trend(attention.and_then(|a| a.stars.as_ref()), 3));
  let _ = writeln!(
    out,
    "- Technical forks (last 3 months): {}",
    trend(attention.and_then(|a| a.technical_fork.as_ref()), 3)
  );

  let _ = writeln!(out, "\n4. Code changes (last 3 months):");
  let _ = writeln!(out, "- Lines added: {}", trend(code.and_then(|c| c.add_lines.as_ref()), 3));
  let _ = writeln!(out, "- Lines removed: {}", trend(code.and_then(|c| c.remove_lines.as_ref()), 3));
  let _ = writeln!(out, "- Total lines changed: {}", trend(code.and_then(|c| c.sum_lines.as_ref()), 3));

  let _ = writeln!(out, "\n5. Contributor details (last 3 months):");
  let _ = writeln!(
    out,
    "- New contributors: {}",
    trend(contributors.and_then(|c| c.new_contributors.as_ref()), 3)
  );
  let _ = writeln!(
    out,
    "- Inactive contributors: {}",
    trend(contributors.and_then(|c| c.inactive_contributors.as_ref()), 3)
  );
  let _ = writeln!(out, "- Bus factor: {}", trend(contributors.and_then(|c| c.bus_factor.as_ref()), 3));

  let _ = writeln!(out, "\n6. OpenRank:");
  let _ = writeln!(
    out,
    "- Project OpenRank (last 6 months): {}",
    trend(snapshot.openrank.as_ref().and_then(|o| o.openrank.as_ref()), 6)
  );
  match snapshot.community_graph() {
    Some(graph) if graph.nodes().is_some() => {
      let _ = writeln!(out, "- Community size: {} nodes", graph.node_count());
      let _ = writeln!(
        out,
        "- Core community members: {}",
        graph.node_labels(CORE_MEMBER_LIMIT).join(", ")
      );
    }
    _ => {
      let _ = writeln!(out, "- No community network data");
    }
  }

  out.push('\n');
  out.push_str(ANALYSIS_REQUEST);
  out.push_str(SCORE_MARKER_EXAMPLE);
  out.push_str("\n\nPresent the analysis in a clear, structured format.\n");
  out
}
