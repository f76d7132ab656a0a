//! Countdown formatting for contest deadlines
//!
//! Renders the time left until a deadline as `<d>d <h>h <m>m`. Days and hours
//! are truncated, minutes within the hour are rounded up, so a deadline 30
//! seconds away reads `0d 0h 1m`. Past deadlines read `0d 0h 0m`.

use chrono::{DateTime, Utc};

use crate::db::{Contest, ContestStatus};

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 3600;
const SECS_PER_DAY: i64 = 86400;

/// Format a remaining duration given in seconds
///
/// # Examples
///
/// ```
/// use bb_common::countdown::format_countdown_secs;
///
/// assert_eq!(format_countdown_secs(90061), "1d 1h 2m");
/// assert_eq!(format_countdown_secs(-5), "0d 0h 0m");
/// ```
pub fn format_countdown_secs(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let days = seconds / SECS_PER_DAY;
    let hours = (seconds % SECS_PER_DAY) / SECS_PER_HOUR;
    let within_hour = seconds % SECS_PER_HOUR;
    let minutes = (within_hour + SECS_PER_MINUTE - 1) / SECS_PER_MINUTE;
    format!("{}d {}h {}m", days, hours, minutes)
}

/// Time left from `now` until `deadline`
pub fn format_countdown(deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format_countdown_secs((deadline - now).num_seconds())
}

/// Phase label plus countdown, e.g. `Open - 2d 3h 15m` or `Voting - 0d 5h 1m`
///
/// `None` for contests that are not running.
pub fn status_line(contest: &Contest, now: DateTime<Utc>) -> Option<String> {
    let label = match contest.status {
        ContestStatus::Entry => "Open",
        ContestStatus::Voting => "Voting",
        ContestStatus::Draft | ContestStatus::Closed => return None,
    };
    let deadline = contest.active_deadline()?;
    Some(format!("{} - {}", label, format_countdown(deadline, now)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn contest(status: ContestStatus, now: DateTime<Utc>) -> Contest {
        Contest {
            id: 1,
            title: "Flip It".to_string(),
            host_id: 7,
            status,
            submission_deadline: now + Duration::hours(26),
            voting_deadline: now + Duration::days(3) + Duration::minutes(30),
            max_votes: 3,
        }
    }

    #[test]
    fn test_minutes_round_up() {
        assert_eq!(format_countdown_secs(30), "0d 0h 1m");
        assert_eq!(format_countdown_secs(60), "0d 0h 1m");
        assert_eq!(format_countdown_secs(61), "0d 0h 2m");
        assert_eq!(format_countdown_secs(SECS_PER_HOUR), "0d 1h 0m");
    }

    #[test]
    fn test_negative_clamps_to_zero() {
        assert_eq!(format_countdown_secs(-3600), "0d 0h 0m");
        assert_eq!(format_countdown_secs(0), "0d 0h 0m");
    }

    #[test]
    fn test_days_and_hours() {
        assert_eq!(format_countdown_secs(2 * SECS_PER_DAY + 3 * SECS_PER_HOUR + 900), "2d 3h 15m");
    }

    #[test]
    fn test_status_line_uses_active_deadline() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            status_line(&contest(ContestStatus::Entry, now), now).as_deref(),
            Some("Open - 1d 2h 0m")
        );
        assert_eq!(
            status_line(&contest(ContestStatus::Voting, now), now).as_deref(),
            Some("Voting - 3d 0h 30m")
        );
        assert_eq!(status_line(&contest(ContestStatus::Closed, now), now), None);
        assert_eq!(status_line(&contest(ContestStatus::Draft, now), now), None);
    }
}
