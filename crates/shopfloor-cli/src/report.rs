//! Rendering of the final job snapshot

use std::fmt::{self, Write};

use anyhow::Result;
use chrono::{DateTime, Utc};
use shopfloor_core::{Job, ReminderStatus, TaskState, format_duration};

/// Jobs as pretty-printed JSON, the same shape the seed file uses.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn render_json(jobs: &[Job]) -> Result<String> {
    Ok(serde_json::to_string_pretty(jobs)?)
}

/// Human-readable block per job, times measured at `now`.
///
/// # Errors
/// Returns an error if formatting fails.
pub fn render_summary(jobs: &[Job], now: DateTime<Utc>) -> Result<String> {
    let mut out = String::new();
    for job in jobs {
        render_job(&mut out, job, now)?;
    }
    Ok(out)
}

fn render_job(out: &mut impl Write, job: &Job, now: DateTime<Utc>) -> fmt::Result {
    let archived = if job.archived { " (archived)" } else { "" };
    writeln!(
        out,
        "{} [{}]{archived} {}",
        job.vehicle_label,
        job.status.as_str(),
        format_duration(job.total_time_spent(now))
    )?;

    let mut tasks: Vec<_> = job.tasks.iter().collect();
    tasks.sort_by_key(|task| task.order);
    for task in tasks {
        let marker = match task.state {
            TaskState::Pending => ' ',
            TaskState::Running => '>',
            TaskState::Done => 'x',
        };
        writeln!(
            out,
            "  [{marker}] {} {}",
            task.title,
            format_duration(task.live_seconds(now))
        )?;
    }

    for reminder in &job.reminders {
        let marker = match reminder.status {
            ReminderStatus::Active => '!',
            ReminderStatus::Done => '-',
        };
        writeln!(out, "  ({marker}) {}", reminder.title)?;
    }

    for entry in &job.status_history {
        let actor = entry
            .actor
            .as_ref()
            .map_or_else(|| "system".to_owned(), ToString::to_string);
        writeln!(
            out,
            "  {} -> {} by {actor}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.status
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone as _};
    use shopfloor_core::{Actor, NewReminder, NewTask};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_summary_shows_live_time_and_history() {
        let mut job = Job::new("ABC-1234", at());
        let first = NewTask::titled("Brake pads").into_task(&job);
        let first_id = first.id;
        job.add_task(first, at()).unwrap();
        job.add_task(NewTask::titled("Oil change").into_task(&job), at())
            .unwrap();
        job.add_reminder(NewReminder::titled("Call customer").into_reminder(job.id), at())
            .unwrap();
        job.start_task(first_id, &Actor::new("u-7", "Carlos"), at())
            .unwrap();

        let summary = render_summary(&[job], at() + Duration::seconds(3725)).unwrap();

        assert!(summary.starts_with("ABC-1234 [in_progress] 01:02:05\n"));
        assert!(summary.contains("  [>] Brake pads 01:02:05\n"));
        assert!(summary.contains("  [ ] Oil change 00:00\n"));
        assert!(summary.contains("  (!) Call customer\n"));
        assert!(summary.contains("-> Reminder by system"));
        assert!(summary.contains("-> In progress by system"));
    }

    #[test]
    fn test_json_round_trips_jobs() {
        let job = Job::new("XYZ-9", at());
        let json = render_json(&[job.clone()]).unwrap();
        let parsed: Vec<Job> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vec![job]);
    }
}
