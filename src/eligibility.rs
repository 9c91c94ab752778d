//! Eligibility policy: which stored records are claimable "now".
//!
//! Pure filter construction, no store access. A record is claimable when it
//! is pending and its run date has passed, or when it is processing but its
//! lease went unrenewed for longer than the expiration threshold.

use chrono::{DateTime, Duration, Utc};

use crate::model::Status;
use crate::store::Filter;

/// Filter for records claimable at `now` under the given expiration
/// threshold:
///
/// `(pending ∧ run_date ≤ now) ∨ (processing ∧ now − heartbeat > expiration)`
pub fn claimable(now: DateTime<Utc>, expiration: Duration) -> Filter {
    Filter::Or(vec![
        Filter::And(vec![
            Filter::Status(Status::Pending),
            Filter::RunDateAtOrBefore(now),
        ]),
        Filter::And(vec![
            Filter::Status(Status::Processing),
            Filter::HeartbeatBefore(now - expiration),
        ]),
    ])
}

/// Filter for the delayed backlog: pending records whose run date is strictly
/// before `now`.
pub fn delayed(now: DateTime<Utc>) -> Filter {
    Filter::And(vec![
        Filter::Status(Status::Pending),
        Filter::RunDateBefore(now),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Item;

    fn processing(heartbeat: DateTime<Utc>) -> Item {
        let mut item = Item::new(heartbeat);
        item.status = Status::Processing;
        item.heartbeat = Some(heartbeat);
        item
    }

    #[test]
    fn pending_due_exactly_now_is_claimable() {
        let now = Utc::now();
        assert!(claimable(now, Duration::seconds(30)).matches(&Item::new(now)));
        assert!(!claimable(now, Duration::seconds(30)).matches(&Item::new(now + Duration::seconds(1))));
    }

    #[test]
    fn heartbeat_at_threshold_boundary_is_not_yet_expired() {
        let now = Utc::now();
        let expiration = Duration::seconds(30);
        let filter = claimable(now, expiration);

        // Renewed exactly `expiration` ago: now - heartbeat == expiration,
        // not strictly greater, so still owned.
        assert!(!filter.matches(&processing(now - expiration)));
        assert!(filter.matches(&processing(now - expiration - Duration::seconds(1))));
    }

    #[test]
    fn zero_threshold_expires_any_past_heartbeat() {
        let now = Utc::now();
        let filter = claimable(now, Duration::zero());
        assert!(filter.matches(&processing(now - Duration::seconds(1))));
        assert!(!filter.matches(&processing(now)));
    }

    #[test]
    fn delayed_is_strictly_before_now() {
        let now = Utc::now();
        assert!(delayed(now).matches(&Item::new(now - Duration::seconds(1))));
        assert!(!delayed(now).matches(&Item::new(now)));

        let mut claimed = Item::new(now - Duration::seconds(1));
        claimed.status = Status::Processing;
        assert!(!delayed(now).matches(&claimed));
    }
}
