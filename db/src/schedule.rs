//! Lecture schedule calendar.
//!
//! A course meets on a weekly pattern; the only persisted deviations are
//! cancellations and their makeup classes. Everything else (whether a given
//! date is a class day, and which week it falls in) is computed on demand
//! from the course row, so the calendar cannot drift out of sync with the
//! pattern.

use chrono::{Datelike, Days, NaiveDate, NaiveTime};
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, DbConn, EntityTrait, SqlErr};
use serde::Serialize;

use crate::error::{DomainError, DomainResult};
use crate::models::attendance_record;
use crate::models::course;
use crate::models::schedule_exception::{self, ExceptionKind};

/// What a given (course, date) pair means.
#[derive(Debug, Clone, PartialEq)]
pub enum Occurrence {
    /// Not a meeting day and no exception: nothing happens.
    NoClass,
    /// A plain pattern match; never stored.
    Regular { week: i64 },
    /// A cancelled meeting, with its makeup date when one is linked.
    Cancelled {
        exception: schedule_exception::Model,
        makeup_date: Option<NaiveDate>,
    },
    /// A makeup meeting replacing the cancellation on `related_date`.
    Makeup {
        exception: schedule_exception::Model,
        related_date: NaiveDate,
    },
}

impl Occurrence {
    /// Whether class is actually held on this occurrence.
    pub fn has_class(&self) -> bool {
        matches!(self, Occurrence::Regular { .. } | Occurrence::Makeup { .. })
    }
}

/// One computed entry of the effective calendar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedOccurrence {
    pub date: NaiveDate,
    pub week: i64,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Resolves what `date` means for `course`. Pure read; never mutates state.
pub async fn resolve_occurrence(
    db: &DbConn,
    course: &course::Model,
    date: NaiveDate,
) -> DomainResult<Occurrence> {
    if let Some(exception) = schedule_exception::Model::find_on_date(db, course.id, date).await? {
        return match exception.kind {
            ExceptionKind::Cancelled => {
                let makeup_date = schedule_exception::Model::find_makeup_for(db, exception.id)
                    .await?
                    .map(|m| m.date);
                Ok(Occurrence::Cancelled {
                    exception,
                    makeup_date,
                })
            }
            ExceptionKind::Makeup => {
                let related_date = match exception.related_date {
                    Some(d) => d,
                    // Fall back to the linked row if the denormalized date is missing.
                    None => match exception.related_id {
                        Some(rid) => schedule_exception::Model::get_by_id(db, rid)
                            .await?
                            .map(|c| c.date)
                            .ok_or(DomainError::NotFound("cancelled occurrence"))?,
                        None => return Err(DomainError::NotFound("cancelled occurrence")),
                    },
                };
                Ok(Occurrence::Makeup {
                    exception,
                    related_date,
                })
            }
        };
    }

    if course.in_term(date) && course.meets_on(date) {
        return Ok(Occurrence::Regular {
            week: course.week_number(date),
        });
    }

    Ok(Occurrence::NoClass)
}

/// Marks a meeting day as cancelled.
///
/// The date must be a pattern day inside the term, free of other exceptions,
/// and must not already carry attendance records.
pub async fn create_cancellation(
    db: &DbConn,
    course: &course::Model,
    date: NaiveDate,
    reason: Option<&str>,
    notes: Option<&str>,
) -> DomainResult<schedule_exception::Model> {
    if !course.in_term(date) {
        return Err(DomainError::validation(
            "date is outside the course date range",
        ));
    }
    if !course.meets_on(date) {
        return Err(DomainError::InvalidWeekday(date.weekday().to_string()));
    }
    if schedule_exception::Model::find_on_date(db, course.id, date)
        .await?
        .is_some()
    {
        return Err(DomainError::Conflict);
    }
    if attendance_record::Model::any_on_date(db, course.id, date).await? {
        return Err(DomainError::HasAttendanceRecords);
    }

    let now = chrono::Utc::now();
    let insert = schedule_exception::ActiveModel {
        course_id: Set(course.id),
        kind: Set(ExceptionKind::Cancelled),
        date: Set(date),
        week: Set(course.week_number(date)),
        reason: Set(reason.map(|r| r.to_owned())),
        notes: Set(notes.map(|n| n.to_owned())),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await;

    match insert {
        Ok(exception) => Ok(exception),
        // Concurrent creators race on the (course, date) unique index.
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            Err(DomainError::Conflict)
        }
        Err(err) => Err(err.into()),
    }
}

/// Schedules a makeup class for the cancellation on `related_date`.
#[allow(clippy::too_many_arguments)]
pub async fn create_makeup(
    db: &DbConn,
    course: &course::Model,
    date: NaiveDate,
    related_date: NaiveDate,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
    reason: Option<&str>,
    notes: Option<&str>,
) -> DomainResult<schedule_exception::Model> {
    if !course.in_term(date) {
        return Err(DomainError::validation(
            "date is outside the course date range",
        ));
    }
    if date <= related_date {
        return Err(DomainError::validation(
            "makeup date must be after the cancelled date",
        ));
    }

    let cancellation = schedule_exception::Model::find_on_date(db, course.id, related_date)
        .await?
        .filter(|e| e.is_cancellation())
        .ok_or(DomainError::NotCancelled)?;

    if schedule_exception::Model::find_makeup_for(db, cancellation.id)
        .await?
        .is_some()
    {
        return Err(DomainError::AlreadyLinked);
    }
    if schedule_exception::Model::find_on_date(db, course.id, date)
        .await?
        .is_some()
    {
        return Err(DomainError::Conflict);
    }

    let now = chrono::Utc::now();
    let insert = schedule_exception::ActiveModel {
        course_id: Set(course.id),
        kind: Set(ExceptionKind::Makeup),
        date: Set(date),
        related_id: Set(Some(cancellation.id)),
        related_date: Set(Some(cancellation.date)),
        start_time: Set(start_time),
        end_time: Set(end_time),
        week: Set(cancellation.week),
        reason: Set(reason.map(|r| r.to_owned())),
        notes: Set(notes.map(|n| n.to_owned())),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await;

    match insert {
        Ok(exception) => Ok(exception),
        Err(err) => match err.sql_err() {
            // Two unique indexes can fire: the per-(course, date) slot and the
            // one-makeup-per-cancellation link.
            Some(SqlErr::UniqueConstraintViolation(msg)) if msg.contains("related") => {
                Err(DomainError::AlreadyLinked)
            }
            Some(SqlErr::UniqueConstraintViolation(_)) => Err(DomainError::Conflict),
            _ => Err(err.into()),
        },
    }
}

/// Removes a persisted exception.
///
/// A cancellation with a linked makeup must lose the makeup first, and an
/// occurrence that attendance records reference cannot be removed at all.
pub async fn delete_exception(db: &DbConn, id: i64) -> DomainResult<()> {
    let exception = schedule_exception::Model::get_by_id(db, id)
        .await?
        .ok_or(DomainError::NotFound("schedule exception"))?;

    if exception.is_cancellation()
        && schedule_exception::Model::find_makeup_for(db, exception.id)
            .await?
            .is_some()
    {
        return Err(DomainError::HasDependentMakeup);
    }

    let referenced = attendance_record::Model::count_for_schedule(db, exception.id).await? > 0
        || attendance_record::Model::any_on_date(db, exception.course_id, exception.date).await?;
    if referenced {
        return Err(DomainError::HasAttendanceRecords);
    }

    schedule_exception::Entity::delete_by_id(exception.id)
        .exec(db)
        .await?;
    Ok(())
}

/// Enumerates the pattern matches between `from` and `to` (inclusive),
/// excluding any whose week number is in `skip_weeks`.
///
/// Week numbers advance every time a 7-day bin from the course start date
/// ends, whether or not that bin contained a meeting day. Stored exceptions
/// are not consulted; this is the raw recurrence expansion.
pub fn bulk_generate(
    course: &course::Model,
    from: NaiveDate,
    to: NaiveDate,
    skip_weeks: &[i64],
) -> Vec<PlannedOccurrence> {
    let mut planned = Vec::new();
    let mut date = from;

    while date <= to {
        if course.in_term(date) && course.meets_on(date) {
            let week = course.week_number(date);
            if !skip_weeks.contains(&week) {
                planned.push(PlannedOccurrence {
                    date,
                    week,
                    start_time: course.start_time,
                    end_time: course.end_time,
                });
            }
        }
        date = match date.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => break,
        };
    }

    planned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attendance_detail::{CheckMethod, RawStatus};
    use crate::models::user::{self, UserType};
    use crate::test_utils::setup_test_db;
    use chrono::Datelike;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    async fn course_mon_wed(db: &DbConn) -> course::Model {
        let prof = user::Model::create(db, "prof", "prof@uni.test", UserType::Professor)
            .await
            .unwrap();
        course::Model::create(
            db,
            prof.id,
            "Compilers",
            "CMP410",
            "2025-1",
            "CS",
            "Mon,Wed",
            time(9, 0),
            time(10, 0),
            date(2025, 3, 3),
            date(2025, 6, 20),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn march_calendar_expands_with_week_numbers() {
        let db = setup_test_db().await;
        let course = course_mon_wed(&db).await;

        let planned = bulk_generate(&course, date(2025, 3, 1), date(2025, 3, 31), &[]);

        let days: Vec<u32> = planned.iter().map(|p| p.date.day()).collect();
        assert_eq!(days, vec![3, 5, 10, 12, 17, 19, 24, 26, 31]);
        let weeks: Vec<i64> = planned.iter().map(|p| p.week).collect();
        assert_eq!(weeks, vec![1, 1, 2, 2, 3, 3, 4, 4, 5]);
        assert!(planned.iter().all(|p| p.start_time == time(9, 0)));
    }

    #[tokio::test]
    async fn skip_weeks_drop_whole_bins() {
        let db = setup_test_db().await;
        let course = course_mon_wed(&db).await;

        let planned = bulk_generate(&course, date(2025, 3, 1), date(2025, 3, 31), &[2, 4]);
        let days: Vec<u32> = planned.iter().map(|p| p.date.day()).collect();
        assert_eq!(days, vec![3, 5, 17, 19, 31]);
    }

    #[tokio::test]
    async fn regular_and_no_class_resolution() {
        let db = setup_test_db().await;
        let course = course_mon_wed(&db).await;

        // Wednesday inside the term.
        match resolve_occurrence(&db, &course, date(2025, 3, 12)).await.unwrap() {
            Occurrence::Regular { week } => assert_eq!(week, 2),
            other => panic!("expected regular, got {other:?}"),
        }

        // Tuesday: not a pattern day.
        assert_eq!(
            resolve_occurrence(&db, &course, date(2025, 3, 11)).await.unwrap(),
            Occurrence::NoClass
        );

        // A Monday before the term starts.
        assert_eq!(
            resolve_occurrence(&db, &course, date(2025, 2, 24)).await.unwrap(),
            Occurrence::NoClass
        );
    }

    #[tokio::test]
    async fn cancellation_roundtrip_and_guards() {
        let db = setup_test_db().await;
        let course = course_mon_wed(&db).await;
        let day = date(2025, 3, 10);

        // Tuesday is not a meeting day.
        let err = create_cancellation(&db, &course, date(2025, 3, 11), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidWeekday(_)));

        // Outside the term.
        let err = create_cancellation(&db, &course, date(2025, 7, 7), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let cancelled = create_cancellation(&db, &course, day, Some("conference"), None)
            .await
            .unwrap();
        assert_eq!(cancelled.kind, ExceptionKind::Cancelled);
        assert_eq!(cancelled.week, 2);

        // Second cancellation on the same slot loses.
        let err = create_cancellation(&db, &course, day, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict));

        match resolve_occurrence(&db, &course, day).await.unwrap() {
            Occurrence::Cancelled {
                exception,
                makeup_date,
            } => {
                assert_eq!(exception.id, cancelled.id);
                assert_eq!(makeup_date, None);
            }
            other => panic!("expected cancelled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_blocked_by_existing_records() {
        let db = setup_test_db().await;
        let course = course_mon_wed(&db).await;
        let day = date(2025, 3, 10);

        let student = user::Model::create(&db, "stu", "stu@uni.test", UserType::Student)
            .await
            .unwrap();
        attendance_record::Model::upsert(
            &db,
            student.id,
            &course,
            day,
            RawStatus::Present,
            CheckMethod::Manual,
            None,
        )
        .await
        .unwrap();

        let err = create_cancellation(&db, &course, day, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::HasAttendanceRecords));
    }

    #[tokio::test]
    async fn makeup_links_to_its_cancellation() {
        let db = setup_test_db().await;
        let course = course_mon_wed(&db).await;
        let cancelled_day = date(2025, 3, 10);
        let makeup_day = date(2025, 3, 15);

        // No cancellation yet.
        let err = create_makeup(&db, &course, makeup_day, cancelled_day, None, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotCancelled));

        create_cancellation(&db, &course, cancelled_day, None, None)
            .await
            .unwrap();

        // Makeup must come after the cancelled date.
        let err = create_makeup(
            &db,
            &course,
            date(2025, 3, 8),
            cancelled_day,
            None,
            None,
            None,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let makeup = create_makeup(&db, &course, makeup_day, cancelled_day, None, None, None, None)
            .await
            .unwrap();
        assert_eq!(makeup.related_date, Some(cancelled_day));
        assert_eq!(makeup.week, 2);

        // One makeup per cancellation.
        let err = create_makeup(
            &db,
            &course,
            date(2025, 3, 22),
            cancelled_day,
            None,
            None,
            None,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyLinked));

        // Round-trip through the resolver from both sides.
        match resolve_occurrence(&db, &course, makeup_day).await.unwrap() {
            Occurrence::Makeup {
                exception,
                related_date,
            } => {
                assert_eq!(exception.id, makeup.id);
                assert_eq!(related_date, cancelled_day);
            }
            other => panic!("expected makeup, got {other:?}"),
        }
        match resolve_occurrence(&db, &course, cancelled_day).await.unwrap() {
            Occurrence::Cancelled { makeup_date, .. } => {
                assert_eq!(makeup_date, Some(makeup_day));
            }
            other => panic!("expected cancelled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_guards_hold() {
        let db = setup_test_db().await;
        let course = course_mon_wed(&db).await;
        let cancelled_day = date(2025, 3, 10);
        let makeup_day = date(2025, 3, 15);

        let cancellation = create_cancellation(&db, &course, cancelled_day, None, None)
            .await
            .unwrap();
        let makeup = create_makeup(&db, &course, makeup_day, cancelled_day, None, None, None, None)
            .await
            .unwrap();

        // Cancellation is pinned by its makeup.
        let err = delete_exception(&db, cancellation.id).await.unwrap_err();
        assert!(matches!(err, DomainError::HasDependentMakeup));

        // A record on the makeup date pins the makeup.
        let student = user::Model::create(&db, "stu", "stu@uni.test", UserType::Student)
            .await
            .unwrap();
        attendance_record::Model::upsert(
            &db,
            student.id,
            &course,
            makeup_day,
            RawStatus::Present,
            CheckMethod::Manual,
            None,
        )
        .await
        .unwrap();
        let err = delete_exception(&db, makeup.id).await.unwrap_err();
        assert!(matches!(err, DomainError::HasAttendanceRecords));

        // Clear the record, then deletion cascades in the right order.
        attendance_record::Entity::delete_many()
            .exec(&db)
            .await
            .unwrap();
        delete_exception(&db, makeup.id).await.unwrap();
        delete_exception(&db, cancellation.id).await.unwrap();
        assert!(
            schedule_exception::Model::get_by_id(&db, cancellation.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn concurrent_cancellations_leave_one_winner() {
        let db = setup_test_db().await;
        let course = course_mon_wed(&db).await;
        let day = date(2025, 3, 10);

        let (a, b) = tokio::join!(
            create_cancellation(&db, &course, day, Some("a"), None),
            create_cancellation(&db, &course, day, Some("b"), None),
        );

        let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one creator must win");
        for result in [a, b] {
            if let Err(err) = result {
                assert!(matches!(err, DomainError::Conflict));
            }
        }

        let rows = schedule_exception::Model::list_for_course(
            &db,
            course.id,
            Default::default(),
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
