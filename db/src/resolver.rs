//! Status reconciliation.
//!
//! An attendance record carries up to two sub-records that may disagree: the
//! raw attendance fact and a leave request justifying it. The display status
//! is derived here and only here; callers never merge the pair themselves.
//! The function is pure and recomputed on read, so it cannot go stale.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::attendance_detail::{self, RawStatus};
use crate::models::leave_request::{self, LeaveStatus};

/// The authoritative display status for a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DerivedStatus {
    Present,
    Late,
    Absent,
    Medical,
    Official,
    /// No raw fact and no approved leave: nothing is known yet.
    Unconfirmed,
}

impl From<RawStatus> for DerivedStatus {
    fn from(status: RawStatus) -> Self {
        match status {
            RawStatus::Present => DerivedStatus::Present,
            RawStatus::Late => DerivedStatus::Late,
            RawStatus::Absent => DerivedStatus::Absent,
            RawStatus::Medical => DerivedStatus::Medical,
            RawStatus::Official => DerivedStatus::Official,
        }
    }
}

/// Merges the optional sub-records into one display status.
///
/// An approved leave counts as attended for display and statistics even
/// though the stored raw fact is left untouched; the raw detail remains the
/// audit trail.
pub fn resolve(
    detail: Option<&attendance_detail::Model>,
    leave: Option<&leave_request::Model>,
) -> DerivedStatus {
    if leave.is_some_and(|l| l.status == LeaveStatus::Approved) {
        return DerivedStatus::Present;
    }

    match detail {
        Some(d) => d.status.into(),
        None => DerivedStatus::Unconfirmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attendance_detail::CheckMethod;
    use chrono::Utc;

    fn detail(status: RawStatus) -> attendance_detail::Model {
        let now = Utc::now();
        attendance_detail::Model {
            id: 1,
            record_id: 1,
            status,
            method: CheckMethod::Manual,
            checked_at: now,
            requires_justification: status.requires_justification(),
            created_at: now,
            updated_at: now,
        }
    }

    fn leave(status: LeaveStatus) -> leave_request::Model {
        let now = Utc::now();
        let today = now.date_naive();
        leave_request::Model {
            id: 1,
            record_id: 1,
            student_id: 1,
            course_id: 1,
            start_date: today,
            end_date: today,
            reason: "flu".into(),
            status,
            feedback: None,
            reviewer_id: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn nothing_known_is_unconfirmed() {
        assert_eq!(resolve(None, None), DerivedStatus::Unconfirmed);
    }

    #[test]
    fn detail_alone_passes_through() {
        assert_eq!(resolve(Some(&detail(RawStatus::Late)), None), DerivedStatus::Late);
        assert_eq!(
            resolve(Some(&detail(RawStatus::Official)), None),
            DerivedStatus::Official
        );
    }

    #[test]
    fn approved_leave_overrides_raw_absence() {
        let d = detail(RawStatus::Absent);
        let l = leave(LeaveStatus::Approved);
        assert_eq!(resolve(Some(&d), Some(&l)), DerivedStatus::Present);
        // The raw fact is untouched.
        assert_eq!(d.status, RawStatus::Absent);
    }

    #[test]
    fn undecided_leave_changes_nothing() {
        let d = detail(RawStatus::Absent);
        for status in [LeaveStatus::Pending, LeaveStatus::UnderReview, LeaveStatus::Rejected] {
            assert_eq!(resolve(Some(&d), Some(&leave(status))), DerivedStatus::Absent);
        }
        assert_eq!(
            resolve(None, Some(&leave(LeaveStatus::Approved))),
            DerivedStatus::Present
        );
    }

    #[test]
    fn repeated_resolution_is_stable() {
        let d = detail(RawStatus::Medical);
        let l = leave(LeaveStatus::Rejected);
        let first = resolve(Some(&d), Some(&l));
        for _ in 0..10 {
            assert_eq!(resolve(Some(&d), Some(&l)), first);
        }
    }
}
