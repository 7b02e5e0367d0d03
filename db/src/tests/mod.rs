//! End-to-end flows across the schedule, check-in, record and leave modules.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use sea_orm::DbConn;

use crate::checkin::{self, CheckInToken, TokenKind};
use crate::error::DomainError;
use crate::models::attendance_detail::{CheckMethod, RawStatus};
use crate::models::course;
use crate::models::leave_request::{self, Decision, LeaveStatus};
use crate::models::attendance_record::{self, RecordFilter};
use crate::models::user::{self, UserType};
use crate::resolver::DerivedStatus;
use crate::schedule::{self, Occurrence};
use crate::test_utils::setup_test_db;

const SECRET: &[u8] = b"integration-secret";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

async fn semester(db: &DbConn) -> (user::Model, user::Model, course::Model) {
    let prof = user::Model::create(db, "prof", "prof@uni.test", UserType::Professor)
        .await
        .unwrap();
    let student = user::Model::create(db, "stu", "stu@uni.test", UserType::Student)
        .await
        .unwrap();
    let course = course::Model::create(
        db,
        prof.id,
        "Distributed Systems",
        "DS440",
        "2025-1",
        "CS",
        "Mon,Wed",
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        date(2025, 3, 3),
        date(2025, 6, 20),
    )
    .await
    .unwrap();
    (prof, student, course)
}

#[tokio::test]
async fn cancellation_then_makeup_redirects_checkin() {
    let db = setup_test_db().await;
    let (_, student, course) = semester(&db).await;
    let cancelled_day = date(2025, 3, 10);
    let makeup_day = date(2025, 3, 15);

    schedule::create_cancellation(&db, &course, cancelled_day, Some("conference"), None)
        .await
        .unwrap();

    // No token can be issued for the cancelled day.
    let err = CheckInToken::issue(
        &db,
        &course,
        cancelled_day,
        TokenKind::Qr,
        at(2025, 3, 10, 8, 55, 0),
        SECRET,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DomainError::ClassCancelled));

    // Manual writes are blocked too.
    let err = attendance_record::Model::upsert(
        &db,
        student.id,
        &course,
        cancelled_day,
        RawStatus::Present,
        CheckMethod::Manual,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DomainError::ClassCancelled));

    // The makeup revives attendance on its own date.
    schedule::create_makeup(&db, &course, makeup_day, cancelled_day, None, None, None, None)
        .await
        .unwrap();

    match schedule::resolve_occurrence(&db, &course, makeup_day).await.unwrap() {
        Occurrence::Makeup { related_date, .. } => assert_eq!(related_date, cancelled_day),
        other => panic!("expected makeup, got {other:?}"),
    }

    let token = CheckInToken::issue(
        &db,
        &course,
        makeup_day,
        TokenKind::Qr,
        at(2025, 3, 15, 8, 55, 0),
        SECRET,
    )
    .await
    .unwrap();
    let view = checkin::redeem(&db, &token, student.id, at(2025, 3, 15, 8, 58, 0), SECRET)
        .await
        .unwrap();
    assert_eq!(view.derived_status, DerivedStatus::Present);
    assert!(view.record.schedule_id.is_some());
}

#[tokio::test]
async fn approved_leave_flips_display_but_not_the_raw_fact() {
    let db = setup_test_db().await;
    let (prof, student, course) = semester(&db).await;
    let day = date(2025, 3, 3);

    // Instructor records an absence.
    let view = attendance_record::Model::upsert(
        &db,
        student.id,
        &course,
        day,
        RawStatus::Absent,
        CheckMethod::Manual,
        None,
    )
    .await
    .unwrap();
    assert!(view.detail.as_ref().unwrap().requires_justification);
    assert_eq!(view.derived_status, DerivedStatus::Absent);

    // Student justifies it; reviewer approves.
    let (request, _) = leave_request::Model::file(
        &db,
        student.id,
        &view.record,
        day,
        day,
        "hospitalized",
        vec![],
    )
    .await
    .unwrap();
    leave_request::Model::decide(&db, request.id, prof.id, Decision::Approved, Some("ok"))
        .await
        .unwrap();

    // Display flips to present, raw detail stays absent.
    let merged = attendance_record::Model::view(&db, view.record.clone()).await.unwrap();
    assert_eq!(merged.derived_status, DerivedStatus::Present);
    assert_eq!(merged.detail.as_ref().unwrap().status, RawStatus::Absent);
    assert_eq!(merged.leave.as_ref().unwrap().status, LeaveStatus::Approved);

    // And the query surface agrees with the single-record view.
    let page = attendance_record::Model::query(
        &db,
        RecordFilter {
            student_id: Some(student.id),
            course_id: Some(course.id),
            page: 1,
            per_page: 10,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(page.views.len(), 1);
    assert_eq!(page.views[0].derived_status, DerivedStatus::Present);
}

#[tokio::test]
async fn a_full_day_in_the_life() {
    let db = setup_test_db().await;
    let (prof, student, course) = semester(&db).await;
    let other = user::Model::create(&db, "stu2", "stu2@uni.test", UserType::Student)
        .await
        .unwrap();
    let day = date(2025, 3, 5);

    // One student checks in by QR, the other is marked late by hand.
    let token = CheckInToken::issue(&db, &course, day, TokenKind::Qr, at(2025, 3, 5, 9, 0, 0), SECRET)
        .await
        .unwrap();
    checkin::redeem(&db, &token, student.id, at(2025, 3, 5, 9, 2, 0), SECRET)
        .await
        .unwrap();
    attendance_record::Model::upsert(
        &db,
        other.id,
        &course,
        day,
        RawStatus::Late,
        CheckMethod::Manual,
        Some("bus strike"),
    )
    .await
    .unwrap();

    // The late student justifies the mark and it is rejected.
    let record = attendance_record::Model::find_by_key(&db, other.id, course.id, day)
        .await
        .unwrap()
        .unwrap();
    let (request, _) = leave_request::Model::file(&db, other.id, &record, day, day, "bus strike", vec![])
        .await
        .unwrap();
    leave_request::Model::decide(&db, request.id, prof.id, Decision::Rejected, Some("not excused"))
        .await
        .unwrap();

    let page = attendance_record::Model::query(
        &db,
        RecordFilter {
            course_id: Some(course.id),
            date_from: Some(day),
            date_to: Some(day),
            page: 1,
            per_page: 10,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let tally = attendance_record::StatusTally::from_views(&page.views);
    assert_eq!(tally.total, 2);
    assert_eq!(tally.present, 1);
    assert_eq!(tally.late, 1);
}
