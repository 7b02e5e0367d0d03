//! Check-in tokens.
//!
//! A token is an ephemeral credential bound to one occurrence of one course:
//! it is issued to the instructor (as a QR payload or a spoken password),
//! redeemed by students, and never persisted. Authenticity comes from an
//! HMAC-SHA256 signature over the payload; freshness from a hard absolute
//! expiry checked at redemption. Expired tokens are simply rejected, there is
//! no revocation list to clean up.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sea_orm::{ColumnTrait, DbConn, EntityTrait, QueryFilter, TransactionTrait};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use strum::{Display, EnumString};

use crate::error::{DomainError, DomainResult};
use crate::models::attendance_detail::{self, CheckMethod, RawStatus};
use crate::models::attendance_record::{self, RecordView};
use crate::models::{course, leave_request};
use crate::schedule::{self, Occurrence};

type HmacSha256 = Hmac<Sha256>;

/// Tokens stay redeemable for this long after issuance.
pub const TOKEN_VALIDITY_MINUTES: i64 = 10;

/// How the credential reaches the student.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TokenKind {
    Qr,
    Password,
}

impl From<TokenKind> for CheckMethod {
    fn from(kind: TokenKind) -> Self {
        match kind {
            TokenKind::Qr => CheckMethod::Qr,
            TokenKind::Password => CheckMethod::Password,
        }
    }
}

/// A signed, time-boxed check-in credential for one (course, date) occurrence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckInToken {
    pub course_id: i64,
    pub date: NaiveDate,
    /// The persisted occurrence behind the token, for traceability. Only set
    /// when the date is a makeup class.
    pub schedule_id: Option<i64>,
    pub kind: TokenKind,
    pub nonce: String,
    pub valid_until: DateTime<Utc>,
    pub signature: String,
}

impl CheckInToken {
    /// Issues a token for `course` on `date`.
    ///
    /// Issuing is refused up front when no class is held that day, so a stray
    /// QR code for a cancelled class can never exist.
    pub async fn issue(
        db: &DbConn,
        course: &course::Model,
        date: NaiveDate,
        kind: TokenKind,
        now: DateTime<Utc>,
        secret: &[u8],
    ) -> DomainResult<CheckInToken> {
        let schedule_id = match schedule::resolve_occurrence(db, course, date).await? {
            Occurrence::Cancelled { .. } => return Err(DomainError::ClassCancelled),
            Occurrence::NoClass => return Err(DomainError::NotScheduled),
            Occurrence::Makeup { exception, .. } => Some(exception.id),
            Occurrence::Regular { .. } => None,
        };

        let mut nonce_bytes = [0u8; 10];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let mut token = CheckInToken {
            course_id: course.id,
            date,
            schedule_id,
            kind,
            nonce: hex::encode(nonce_bytes),
            valid_until: now + Duration::minutes(TOKEN_VALIDITY_MINUTES),
            signature: String::new(),
        };
        token.signature = token.compute_signature(secret);
        Ok(token)
    }

    /// The byte string the signature covers.
    fn canonical_payload(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.course_id,
            self.date,
            self.schedule_id
                .map_or_else(|| "-".to_string(), |id| id.to_string()),
            self.kind,
            self.nonce,
            self.valid_until.timestamp(),
        )
    }

    fn compute_signature(&self, secret: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
        mac.update(self.canonical_payload().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time signature check.
    pub fn verify(&self, secret: &[u8]) -> bool {
        let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
        mac.update(self.canonical_payload().as_bytes());
        match hex::decode(&self.signature) {
            Ok(sig) => mac.verify_slice(&sig).is_ok(),
            Err(_) => false,
        }
    }

    /// Whether `now` is past the token's life. The upper bound is exclusive
    /// for redemption: a token redeemed exactly at `valid_until` is expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.valid_until
    }
}

/// Redeems `token` for `student_id`, recording a present mark.
///
/// Creates or updates the canonical record and its detail in one transaction.
/// A student who already holds a present or late mark for the occurrence gets
/// `AlreadyCheckedIn`; of two concurrent redemptions exactly one succeeds and
/// the other observes the winner, never a duplicate row.
pub async fn redeem(
    db: &DbConn,
    token: &CheckInToken,
    student_id: i64,
    now: DateTime<Utc>,
    secret: &[u8],
) -> DomainResult<RecordView> {
    if !token.verify(secret) {
        return Err(DomainError::validation("invalid token signature"));
    }
    if token.is_expired(now) {
        return Err(DomainError::Expired);
    }

    let course = course::Model::get_by_id(db, token.course_id)
        .await?
        .ok_or(DomainError::NotFound("course"))?;

    // Re-resolve at redemption time: the schedule may have changed since the
    // token was issued.
    let schedule_id = match schedule::resolve_occurrence(db, &course, token.date).await? {
        Occurrence::Cancelled { .. } => return Err(DomainError::ClassCancelled),
        Occurrence::NoClass => return Err(DomainError::NotScheduled),
        Occurrence::Makeup { exception, .. } => Some(exception.id),
        Occurrence::Regular { .. } => None,
    };

    let txn = db.begin().await?;

    let record = attendance_record::Model::ensure_record(
        &txn,
        student_id,
        course.id,
        token.date,
        schedule_id,
        None,
        now,
    )
    .await?;

    let existing = attendance_detail::Entity::find()
        .filter(attendance_detail::Column::RecordId.eq(record.id))
        .one(&txn)
        .await?;
    if let Some(detail) = &existing {
        if matches!(detail.status, RawStatus::Present | RawStatus::Late) {
            return Err(DomainError::AlreadyCheckedIn);
        }
    }

    let detail = attendance_record::Model::write_detail(
        &txn,
        record.id,
        RawStatus::Present,
        token.kind.into(),
        now,
    )
    .await?;

    txn.commit().await?;

    let leave = leave_request::Model::find_for_record(db, record.id).await?;
    Ok(RecordView::assemble(record, Some(detail), leave))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{self, UserType};
    use crate::resolver::DerivedStatus;
    use crate::test_utils::setup_test_db;
    use chrono::{NaiveTime, TimeZone};
    use sea_orm::PaginatorTrait;

    const SECRET: &[u8] = b"test-checkin-secret";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    async fn fixture(db: &DbConn) -> (user::Model, course::Model) {
        let prof = user::Model::create(db, "prof", "prof@uni.test", UserType::Professor)
            .await
            .unwrap();
        let student = user::Model::create(db, "stu", "stu@uni.test", UserType::Student)
            .await
            .unwrap();
        let course = course::Model::create(
            db,
            prof.id,
            "Graphics",
            "GFX350",
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
        (student, course)
    }

    #[tokio::test]
    async fn issue_signs_a_ten_minute_window() {
        let db = setup_test_db().await;
        let (_, course) = fixture(&db).await;
        let issued_at = at(2025, 3, 3, 10, 0, 0);

        let token = CheckInToken::issue(&db, &course, date(2025, 3, 3), TokenKind::Qr, issued_at, SECRET)
            .await
            .unwrap();

        assert_eq!(token.valid_until, at(2025, 3, 3, 10, 10, 0));
        assert_eq!(token.schedule_id, None);
        assert!(token.verify(SECRET));
        assert!(!token.verify(b"wrong-secret"));
    }

    #[tokio::test]
    async fn issue_refuses_days_without_class() {
        let db = setup_test_db().await;
        let (_, course) = fixture(&db).await;
        let now = at(2025, 3, 3, 10, 0, 0);

        // Tuesday.
        let err = CheckInToken::issue(&db, &course, date(2025, 3, 11), TokenKind::Qr, now, SECRET)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotScheduled));

        crate::schedule::create_cancellation(&db, &course, date(2025, 3, 10), None, None)
            .await
            .unwrap();
        let err = CheckInToken::issue(&db, &course, date(2025, 3, 10), TokenKind::Qr, now, SECRET)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ClassCancelled));
    }

    #[tokio::test]
    async fn redeem_records_presence() {
        let db = setup_test_db().await;
        let (student, course) = fixture(&db).await;
        let issued_at = at(2025, 3, 3, 10, 0, 0);

        let token = CheckInToken::issue(&db, &course, date(2025, 3, 3), TokenKind::Qr, issued_at, SECRET)
            .await
            .unwrap();

        let view = redeem(&db, &token, student.id, at(2025, 3, 3, 10, 9, 59), SECRET)
            .await
            .unwrap();
        assert_eq!(view.derived_status, DerivedStatus::Present);
        let detail = view.detail.unwrap();
        assert_eq!(detail.status, RawStatus::Present);
        assert_eq!(detail.method, CheckMethod::Qr);

        // Same student again: the occurrence is already checked in.
        let err = redeem(&db, &token, student.id, at(2025, 3, 3, 10, 9, 59), SECRET)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyCheckedIn));
    }

    #[tokio::test]
    async fn expiry_bound_is_inclusive() {
        let db = setup_test_db().await;
        let (student, course) = fixture(&db).await;
        let issued_at = at(2025, 3, 3, 10, 0, 0);

        let token = CheckInToken::issue(&db, &course, date(2025, 3, 3), TokenKind::Password, issued_at, SECRET)
            .await
            .unwrap();

        // Exactly at valid_until is already too late.
        let err = redeem(&db, &token, student.id, at(2025, 3, 3, 10, 10, 0), SECRET)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Expired));

        let err = redeem(&db, &token, student.id, at(2025, 3, 3, 10, 10, 1), SECRET)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Expired));

        let view = redeem(&db, &token, student.id, at(2025, 3, 3, 10, 9, 59), SECRET)
            .await
            .unwrap();
        assert_eq!(view.detail.unwrap().method, CheckMethod::Password);
    }

    #[tokio::test]
    async fn tampered_tokens_bounce() {
        let db = setup_test_db().await;
        let (student, course) = fixture(&db).await;
        let issued_at = at(2025, 3, 3, 10, 0, 0);

        let mut token = CheckInToken::issue(&db, &course, date(2025, 3, 3), TokenKind::Qr, issued_at, SECRET)
            .await
            .unwrap();
        // Stretch the expiry without re-signing.
        token.valid_until = token.valid_until + Duration::minutes(60);

        let err = redeem(&db, &token, student.id, at(2025, 3, 3, 10, 5, 0), SECRET)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn redeem_rechecks_the_calendar() {
        let db = setup_test_db().await;
        let (student, course) = fixture(&db).await;
        let issued_at = at(2025, 3, 10, 9, 0, 0);
        let day = date(2025, 3, 10);

        let token = CheckInToken::issue(&db, &course, day, TokenKind::Qr, issued_at, SECRET)
            .await
            .unwrap();

        // Cancelled between issue and redemption.
        crate::schedule::create_cancellation(&db, &course, day, None, None)
            .await
            .unwrap();

        let err = redeem(&db, &token, student.id, at(2025, 3, 10, 9, 5, 0), SECRET)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ClassCancelled));
    }

    #[tokio::test]
    async fn makeup_tokens_carry_the_occurrence() {
        let db = setup_test_db().await;
        let (student, course) = fixture(&db).await;

        crate::schedule::create_cancellation(&db, &course, date(2025, 3, 10), None, None)
            .await
            .unwrap();
        let makeup = crate::schedule::create_makeup(
            &db,
            &course,
            date(2025, 3, 15),
            date(2025, 3, 10),
            None,
            None,
            None,
            None,
        )
        .await
        .unwrap();

        let issued_at = at(2025, 3, 15, 9, 0, 0);
        let token = CheckInToken::issue(&db, &course, date(2025, 3, 15), TokenKind::Qr, issued_at, SECRET)
            .await
            .unwrap();
        assert_eq!(token.schedule_id, Some(makeup.id));

        let view = redeem(&db, &token, student.id, at(2025, 3, 15, 9, 1, 0), SECRET)
            .await
            .unwrap();
        assert_eq!(view.record.schedule_id, Some(makeup.id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_redeems_have_one_winner() {
        let db = setup_test_db().await;
        let (student, course) = fixture(&db).await;
        let issued_at = at(2025, 3, 3, 10, 0, 0);
        let redeem_at = at(2025, 3, 3, 10, 1, 0);

        let token = CheckInToken::issue(&db, &course, date(2025, 3, 3), TokenKind::Qr, issued_at, SECRET)
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            redeem(&db, &token, student.id, redeem_at, SECRET),
            redeem(&db, &token, student.id, redeem_at, SECRET),
        );

        let ok = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 1, "exactly one redemption must win");
        for result in [a, b] {
            if let Err(err) = result {
                assert!(matches!(err, DomainError::AlreadyCheckedIn));
            }
        }

        let count = attendance_record::Entity::find()
            .filter(attendance_record::Column::StudentId.eq(student.id))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
