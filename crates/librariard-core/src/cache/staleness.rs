use chrono::{DateTime, Local};
use tracing::warn;

/// Decide whether the cached checkouts can be served without a refresh.
///
/// The cache is fresh for the rest of the local calendar day on which the
/// last successful refresh finished. A forced refresh is never fresh, and
/// a missing or unreadable timestamp counts as stale.
pub fn is_fresh(last_fetched: Option<&str>, now: DateTime<Local>, force: bool) -> bool {
    if force {
        return false;
    }

    let Some(raw) = last_fetched else {
        return false;
    };

    match DateTime::parse_from_rfc3339(raw) {
        Ok(fetched) => fetched.with_timezone(&Local).date_naive() == now.date_naive(),
        Err(e) => {
            warn!(value = raw, error = %e, "Unreadable lastFetchedDate, treating cache as stale");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        let naive = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap();
        Local.from_local_datetime(&naive).earliest().unwrap()
    }

    #[test]
    fn test_absent_is_stale() {
        assert!(!is_fresh(None, Local::now(), false));
    }

    #[test]
    fn test_force_is_always_stale() {
        let now = Local::now();
        let stamp = now.to_rfc3339();
        assert!(is_fresh(Some(&stamp), now, false));
        assert!(!is_fresh(Some(&stamp), now, true));
    }

    #[test]
    fn test_same_day_is_fresh_regardless_of_elapsed_time() {
        let fetched = local(2024, 6, 1, 0, 5).to_rfc3339();
        let now = local(2024, 6, 1, 23, 55);
        assert!(is_fresh(Some(&fetched), now, false));
    }

    #[test]
    fn test_next_day_is_stale_even_minutes_later() {
        let fetched = local(2024, 6, 1, 23, 59).to_rfc3339();
        let now = local(2024, 6, 1, 23, 59) + Duration::minutes(2);
        assert!(!is_fresh(Some(&fetched), now, false));
    }

    #[test]
    fn test_same_day_of_month_in_other_month_is_stale() {
        let fetched = local(2024, 5, 1, 9, 0).to_rfc3339();
        let now = local(2024, 6, 1, 9, 0);
        assert!(!is_fresh(Some(&fetched), now, false));
    }

    #[test]
    fn test_day_compared_in_local_time() {
        // Same instant written with a UTC offset still lands on the local day
        let fetched = local(2024, 6, 1, 12, 0).with_timezone(&chrono::Utc).to_rfc3339();
        let now = local(2024, 6, 1, 18, 0);
        assert!(is_fresh(Some(&fetched), now, false));
    }

    #[test]
    fn test_unparseable_is_stale() {
        assert!(!is_fresh(Some("yesterday"), Local::now(), false));
    }
}
