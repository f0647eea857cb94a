use crate::model::{
    FileSummary, ReportOutput, RepositorySummary, StatsDocument, SCHEMA_VERSION, WEEKDAY_NAMES,
};
use crate::util::TIMESTAMP_FORMAT;
use chrono::Utc;
use std::fmt::Write;

pub fn summarize(stats: &StatsDocument, stats_path: &str) -> ReportOutput {
    let repositories = stats
        .repositories
        .iter()
        .map(|(path, repo)| RepositorySummary {
            path: path.clone(),
            total_commits: repo.total_commits,
            last_commit: repo.last_commit.map(|ts| ts.format(TIMESTAMP_FORMAT).to_string()),
            peak_hour: repo.peak_hour(),
            peak_day: WEEKDAY_NAMES[repo.peak_day()].to_string(),
            commit_types: repo.commit_types.clone(),
            files: repo
                .files
                .iter()
                .map(|(file, fs)| FileSummary {
                    path: file.clone(),
                    commits: fs.commits,
                    last_modified: fs.last_modified.map(|ts| ts.format(TIMESTAMP_FORMAT).to_string()),
                    complexity_score: fs.complexity_score,
                })
                .collect(),
        })
        .collect();

    ReportOutput {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        stats_path: stats_path.to_string(),
        total_commits: stats.global.total_commits,
        current_streak: stats.global.commit_streaks.current,
        longest_streak: stats.global.commit_streaks.longest,
        repositories,
    }
}

/// Plain-text activity summary.
pub fn render_text(report: &ReportOutput) -> String {
    let mut out = String::new();
    let never = "never";

    // Writing into a String cannot fail.
    let _ = writeln!(out, "=== Overall ===");
    let _ = writeln!(out, "Total commits: {}", report.total_commits);
    let _ = writeln!(out, "Current streak: {}", report.current_streak);
    let _ = writeln!(out, "Longest streak: {}", report.longest_streak);

    let _ = writeln!(out, "\n=== Repositories ===");
    for repo in &report.repositories {
        let _ = writeln!(out, "\nRepository: {}", repo.path);
        let _ = writeln!(out, "Total commits: {}", repo.total_commits);
        let _ = writeln!(out, "Last commit: {}", repo.last_commit.as_deref().unwrap_or(never));
        let _ = writeln!(out, "Peak activity: {}:00, {}", repo.peak_hour, repo.peak_day);
        if !repo.commit_types.is_empty() {
            let types: Vec<String> = repo
                .commit_types
                .iter()
                .map(|(kind, n)| format!("{kind}={n}"))
                .collect();
            let _ = writeln!(out, "Commit types: {}", types.join(", "));
        }

        let _ = writeln!(out, "\nFiles:");
        for file in &repo.files {
            let _ = writeln!(out, "\n  {}", file.path);
            let _ = writeln!(out, "  Commits: {}", file.commits);
            let _ = writeln!(
                out,
                "  Last modified: {}",
                file.last_modified.as_deref().unwrap_or(never)
            );
            let _ = writeln!(out, "  Complexity: {:.2}", file.complexity_score);
        }
    }

    out
}
