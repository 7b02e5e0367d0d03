use axum::http::StatusCode;
use db::error::DomainError;

/// Maps a domain error onto the HTTP status its callers expect.
///
/// Uniqueness races and dependency guards are conflicts; scheduling and
/// workflow rule violations are plain bad requests; infrastructure trouble is
/// the only 5xx and the only retryable case.
pub fn status_for(err: &DomainError) -> StatusCode {
    match err {
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Conflict
        | DomainError::AlreadyLinked
        | DomainError::HasDependentMakeup
        | DomainError::HasAttendanceRecords
        | DomainError::AlreadyCheckedIn
        | DomainError::AlreadyDecided => StatusCode::CONFLICT,
        DomainError::Forbidden => StatusCode::FORBIDDEN,
        DomainError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::Expired
        | DomainError::ClassCancelled
        | DomainError::NotScheduled
        | DomainError::InvalidWeekday(_)
        | DomainError::NotCancelled
        | DomainError::NotJustifiable
        | DomainError::Immutable
        | DomainError::InvalidDecision
        | DomainError::InvalidRange
        | DomainError::StateViolation { .. }
        | DomainError::Validation(_) => StatusCode::BAD_REQUEST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_and_not_found_map_distinctly() {
        assert_eq!(status_for(&DomainError::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&DomainError::AlreadyCheckedIn),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&DomainError::NotFound("course")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_for(&DomainError::Expired), StatusCode::BAD_REQUEST);
    }
}
