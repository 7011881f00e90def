//! Merge checkouts from every account into one due-date ordered list.

use chrono::{DateTime, Local};

use crate::due_date::{self, DueDateError};
use crate::models::{ComputedCheckout, RawCheckout};

/// Compute every record and order the result by real due date.
///
/// The sort is stable, so checkouts due at the same instant keep the order
/// they were given in (account order, then fetch order).
pub fn assemble(
    records: &[RawCheckout],
    now: DateTime<Local>,
) -> Result<Vec<ComputedCheckout>, DueDateError> {
    let mut computed = records
        .iter()
        .map(|rec| due_date::compute(rec, now))
        .collect::<Result<Vec<_>, _>>()?;

    computed.sort_by_key(|c| c.real_due_ms);
    Ok(computed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::due_date::local_midnight;
    use crate::models::CheckoutKey;
    use chrono::NaiveDate;

    fn now() -> DateTime<Local> {
        local_midnight(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()).unwrap()
    }

    fn record(account: &str, metadata: &str, due: &str) -> RawCheckout {
        RawCheckout {
            key: CheckoutKey::new(account, metadata),
            times_renewed: 2,
            due_date: due.to_string(),
            title: format!("{account}-{metadata}"),
            cover_url: None,
        }
    }

    #[test]
    fn test_orders_across_accounts_by_real_due() {
        // Accounts iterated in an order unrelated to their due dates
        let records = vec![
            record("c", "S3", "2024-06-20"),
            record("a", "S1", "2024-06-05"),
            record("b", "S2", "2024-06-10"),
        ];

        let out = assemble(&records, now()).unwrap();
        let titles: Vec<_> = out.iter().map(|c| c.title()).collect();
        assert_eq!(titles, vec!["a-S1", "b-S2", "c-S3"]);
        assert!(out.windows(2).all(|w| w[0].real_due_ms <= w[1].real_due_ms));
    }

    #[test]
    fn test_renewals_change_order() {
        // Due earlier but two renewals left beats an unrenewable later item
        let mut early = record("a", "S1", "2024-06-05");
        early.times_renewed = 0;
        let late = record("b", "S2", "2024-06-10");

        let out = assemble(&[early, late], now()).unwrap();
        assert_eq!(out[0].title(), "b-S2");
        assert_eq!(out[1].title(), "a-S1");
    }

    #[test]
    fn test_ties_keep_input_order() {
        let records = vec![
            record("b", "S2", "2024-06-05"),
            record("a", "S1", "2024-06-05T10:00:00Z"),
            record("c", "S3", "2024-06-05"),
        ];

        let out = assemble(&records, now()).unwrap();
        let titles: Vec<_> = out.iter().map(|c| c.title()).collect();
        assert_eq!(titles, vec!["b-S2", "a-S1", "c-S3"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(assemble(&[], now()).unwrap().is_empty());
    }

    #[test]
    fn test_one_bad_due_date_fails_the_whole_view() {
        let records = vec![record("a", "S1", "2024-06-05"), record("a", "S2", "tbd")];
        let err = assemble(&records, now()).unwrap_err();
        assert_eq!(err.value, "tbd");
    }
}
