use chrono::{DateTime, Utc};

/// Format an optional timestamp for display, returning `"-"` when `None`.
fn fmt_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

/// Print the most recent ingest runs, newest first.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub(crate) async fn run_list_runs(
    pool: &sqlx::PgPool,
    limit: i64,
    with_failures: bool,
) -> anyhow::Result<()> {
    let runs = showmirror_db::list_ingest_runs(pool, limit.max(1)).await?;
    if runs.is_empty() {
        println!("no ingest runs recorded yet; run `ingest` first");
        return Ok(());
    }

    println!(
        "{:<8}{:<13}{:<10}{:<11}{:<18}{:>9}{:>9}{:>8}  WATERMARK",
        "ID", "MODE", "TRIGGER", "STATUS", "STARTED", "SHOWS", "OK", "FAILED"
    );
    for run in &runs {
        println!(
            "{:<8}{:<13}{:<10}{:<11}{:<18}{:>9}{:>9}{:>8}  {}",
            run.id,
            run.mode,
            run.trigger_source,
            run.status,
            fmt_time(run.started_at),
            run.shows_attempted,
            run.shows_succeeded,
            run.shows_failed,
            if run.watermark_advanced { "advanced" } else { "-" }
        );
        if let Some(message) = &run.error_message {
            println!("        {message}");
        }
        if with_failures && run.shows_failed > 0 {
            for failure in showmirror_db::list_ingest_run_failures(pool, run.id).await? {
                println!(
                    "        show {:<8} {:<16} {}",
                    failure.show_id, failure.failure_kind, failure.message
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn missing_time_renders_as_dash() {
        assert_eq!(fmt_time(None), "-");
    }

    #[test]
    fn time_renders_to_the_minute() {
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(fmt_time(Some(at)), "2026-03-04 05:06");
    }
}
