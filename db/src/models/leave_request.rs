use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{IntoActiveModel, QueryOrder, SqlErr, TransactionTrait};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{DomainError, DomainResult};
use crate::models::{attendance_detail, attendance_record, leave_evidence};

/// Review state of a leave request. `Approved` and `Rejected` are terminal;
/// the request is only editable while `Pending`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display, EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "under_review")]
    UnderReview,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl LeaveStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, LeaveStatus::Approved | LeaveStatus::Rejected)
    }
}

/// A reviewer's verdict. `UnderReview` routes the request for further
/// scrutiny; the other two close it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Decision {
    UnderReview,
    Approved,
    Rejected,
}

impl Decision {
    fn target(self) -> LeaveStatus {
        match self {
            Decision::UnderReview => LeaveStatus::UnderReview,
            Decision::Approved => LeaveStatus::Approved,
            Decision::Rejected => LeaveStatus::Rejected,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "leave_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub record_id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: LeaveStatus,
    pub feedback: Option<String>,
    pub reviewer_id: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::attendance_record::Entity",
        from = "Column::RecordId",
        to = "super::attendance_record::Column::Id",
        on_delete = "Cascade"
    )]
    Record,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::StudentId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Student,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ReviewerId",
        to = "super::user::Column::Id"
    )]
    Reviewer,
    #[sea_orm(has_many = "super::leave_evidence::Entity")]
    Evidence,
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Record.def()
    }
}

impl Related<super::leave_evidence::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Evidence.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Stored-blob reference for one uploaded file, produced by the evidence
/// store before the request row is written.
#[derive(Debug, Clone, Deserialize)]
pub struct EvidenceMeta {
    pub filename: String,
    pub handle: String,
    pub size: i64,
    pub content_type: String,
}

/// Fields a student may change while the request is still pending.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct LeaveChanges {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub reason: Option<String>,
}

/// Optional filters for listing requests.
#[derive(Debug, Default, Clone)]
pub struct LeaveFilter {
    pub student_id: Option<i64>,
    pub course_id: Option<i64>,
    pub status: Option<LeaveStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl Model {
    pub async fn get_by_id(db: &DbConn, id: i64) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    pub async fn find_for_record(db: &DbConn, record_id: i64) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::RecordId.eq(record_id))
            .one(db)
            .await
    }

    pub async fn list(db: &DbConn, filter: LeaveFilter) -> Result<Vec<Model>, DbErr> {
        let mut select = Entity::find();
        if let Some(student_id) = filter.student_id {
            select = select.filter(Column::StudentId.eq(student_id));
        }
        if let Some(course_id) = filter.course_id {
            select = select.filter(Column::CourseId.eq(course_id));
        }
        if let Some(status) = filter.status {
            select = select.filter(Column::Status.eq(status));
        }
        if let Some(from) = filter.from {
            select = select.filter(Column::StartDate.gte(from));
        }
        if let Some(to) = filter.to {
            select = select.filter(Column::EndDate.lte(to));
        }
        select.order_by_desc(Column::CreatedAt).all(db).await
    }

    /// Files a justification against an existing record.
    ///
    /// Only records whose raw status is flagged `requires_justification` can
    /// be contested; a record can carry at most one request (unique index).
    pub async fn file(
        db: &DbConn,
        student_id: i64,
        record: &attendance_record::Model,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: &str,
        evidence: Vec<EvidenceMeta>,
    ) -> DomainResult<(Model, Vec<leave_evidence::Model>)> {
        if record.student_id != student_id {
            return Err(DomainError::Forbidden);
        }
        if end_date < start_date {
            return Err(DomainError::InvalidRange);
        }
        if reason.trim().is_empty() {
            return Err(DomainError::validation("reason must not be empty"));
        }

        let detail = attendance_detail::Model::find_for_record(db, record.id).await?;
        if !detail.is_some_and(|d| d.requires_justification) {
            return Err(DomainError::NotJustifiable);
        }

        let txn = db.begin().await?;
        let now = Utc::now();

        let insert = ActiveModel {
            record_id: Set(record.id),
            student_id: Set(student_id),
            course_id: Set(record.course_id),
            start_date: Set(start_date),
            end_date: Set(end_date),
            reason: Set(reason.to_owned()),
            status: Set(LeaveStatus::Pending),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await;

        let request = match insert {
            Ok(request) => request,
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                return Err(DomainError::Conflict);
            }
            Err(err) => return Err(err.into()),
        };

        let mut rows = Vec::with_capacity(evidence.len());
        for meta in evidence {
            let row = leave_evidence::ActiveModel {
                request_id: Set(request.id),
                filename: Set(meta.filename),
                handle: Set(meta.handle),
                size: Set(meta.size),
                content_type: Set(meta.content_type),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            rows.push(row);
        }

        txn.commit().await?;
        Ok((request, rows))
    }

    /// Edits the request. Permitted only while `Pending`.
    pub async fn edit(db: &DbConn, id: i64, changes: LeaveChanges) -> DomainResult<Model> {
        let txn = db.begin().await?;

        let request = Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(DomainError::NotFound("leave request"))?;
        if request.status != LeaveStatus::Pending {
            return Err(DomainError::Immutable);
        }

        let start = changes.start_date.unwrap_or(request.start_date);
        let end = changes.end_date.unwrap_or(request.end_date);
        if end < start {
            return Err(DomainError::InvalidRange);
        }

        let mut active = request.into_active_model();
        active.start_date = Set(start);
        active.end_date = Set(end);
        if let Some(reason) = changes.reason {
            if reason.trim().is_empty() {
                return Err(DomainError::validation("reason must not be empty"));
            }
            active.reason = Set(reason);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Applies a reviewer's decision.
    ///
    /// The state is re-read inside the transaction so concurrent decisions
    /// for the same request cannot both win. Terminal decisions record the
    /// reviewer and timestamp; routing to `UnderReview` does not.
    pub async fn decide(
        db: &DbConn,
        id: i64,
        reviewer_id: i64,
        decision: Decision,
        feedback: Option<&str>,
    ) -> DomainResult<Model> {
        let txn = db.begin().await?;

        let request = Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(DomainError::NotFound("leave request"))?;

        if request.status.is_terminal() {
            return Err(DomainError::AlreadyDecided);
        }
        let target = decision.target();
        if request.status == LeaveStatus::UnderReview && target == LeaveStatus::UnderReview {
            return Err(DomainError::StateViolation {
                from: request.status.to_string(),
                to: target.to_string(),
            });
        }

        let now = Utc::now();
        let mut active = request.into_active_model();
        active.status = Set(target);
        active.updated_at = Set(now);
        if target.is_terminal() {
            active.reviewer_id = Set(Some(reviewer_id));
            active.reviewed_at = Set(Some(now));
            active.feedback = Set(feedback.map(|f| f.to_owned()));
        }

        let updated = active.update(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Withdraws a pending request, deleting it and its evidence rows.
    ///
    /// Returns the blob handles so the caller can clean up the stored files;
    /// that cleanup is best-effort and must not fail the withdrawal.
    pub async fn withdraw(db: &DbConn, id: i64) -> DomainResult<Vec<String>> {
        let txn = db.begin().await?;

        let request = Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(DomainError::NotFound("leave request"))?;
        if request.status != LeaveStatus::Pending {
            return Err(DomainError::Immutable);
        }

        let handles: Vec<String> = leave_evidence::Entity::find()
            .filter(leave_evidence::Column::RequestId.eq(request.id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|e| e.handle)
            .collect();

        leave_evidence::Entity::delete_many()
            .filter(leave_evidence::Column::RequestId.eq(request.id))
            .exec(&txn)
            .await?;
        Entity::delete_by_id(request.id).exec(&txn).await?;

        txn.commit().await?;
        Ok(handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attendance_detail::{CheckMethod, RawStatus};
    use crate::models::course;
    use crate::models::user::{self, UserType};
    use crate::test_utils::setup_test_db;
    use chrono::NaiveTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn absent_record(
        db: &DbConn,
        status: RawStatus,
    ) -> (user::Model, user::Model, attendance_record::Model) {
        let prof = user::Model::create(db, "prof", "prof@uni.test", UserType::Professor)
            .await
            .unwrap();
        let student = user::Model::create(db, "stu", "stu@uni.test", UserType::Student)
            .await
            .unwrap();
        let course = course::Model::create(
            db,
            prof.id,
            "Networks",
            "NET301",
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

        let view = attendance_record::Model::upsert(
            db,
            student.id,
            &course,
            date(2025, 3, 3),
            status,
            CheckMethod::Manual,
            None,
        )
        .await
        .unwrap();

        (prof, student, view.record)
    }

    #[tokio::test]
    async fn file_requires_justifiable_status() {
        let db = setup_test_db().await;
        let (_, student, record) = absent_record(&db, RawStatus::Present).await;

        let err = Model::file(
            &db,
            student.id,
            &record,
            date(2025, 3, 3),
            date(2025, 3, 3),
            "felt fine actually",
            vec![],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::NotJustifiable));
    }

    #[tokio::test]
    async fn file_rejects_inverted_range_and_duplicates() {
        let db = setup_test_db().await;
        let (_, student, record) = absent_record(&db, RawStatus::Absent).await;

        let err = Model::file(
            &db,
            student.id,
            &record,
            date(2025, 3, 5),
            date(2025, 3, 3),
            "flu",
            vec![],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidRange));

        Model::file(
            &db,
            student.id,
            &record,
            date(2025, 3, 3),
            date(2025, 3, 3),
            "flu",
            vec![],
        )
        .await
        .unwrap();

        let dup = Model::file(
            &db,
            student.id,
            &record,
            date(2025, 3, 3),
            date(2025, 3, 3),
            "flu again",
            vec![],
        )
        .await
        .unwrap_err();
        assert!(matches!(dup, DomainError::Conflict));
    }

    #[tokio::test]
    async fn file_stores_evidence_rows() {
        let db = setup_test_db().await;
        let (_, student, record) = absent_record(&db, RawStatus::Medical).await;

        let (request, rows) = Model::file(
            &db,
            student.id,
            &record,
            date(2025, 3, 3),
            date(2025, 3, 4),
            "flu",
            vec![EvidenceMeta {
                filename: "note.pdf".into(),
                handle: "abc_note.pdf".into(),
                size: 128,
                content_type: "application/pdf".into(),
            }],
        )
        .await
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request_id, request.id);
        let listed = leave_evidence::Model::list_for_request(&db, request.id)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].handle, "abc_note.pdf");
    }

    #[tokio::test]
    async fn edit_only_while_pending() {
        let db = setup_test_db().await;
        let (prof, student, record) = absent_record(&db, RawStatus::Absent).await;

        let (request, _) = Model::file(
            &db,
            student.id,
            &record,
            date(2025, 3, 3),
            date(2025, 3, 3),
            "flu",
            vec![],
        )
        .await
        .unwrap();

        let edited = Model::edit(
            &db,
            request.id,
            LeaveChanges {
                end_date: Some(date(2025, 3, 5)),
                reason: Some("flu, doctor visit".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(edited.end_date, date(2025, 3, 5));

        Model::decide(&db, request.id, prof.id, Decision::Rejected, None)
            .await
            .unwrap();

        let err = Model::edit(&db, request.id, LeaveChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Immutable));
    }

    #[tokio::test]
    async fn decide_walks_the_state_machine() {
        let db = setup_test_db().await;
        let (prof, student, record) = absent_record(&db, RawStatus::Absent).await;

        let (request, _) = Model::file(
            &db,
            student.id,
            &record,
            date(2025, 3, 3),
            date(2025, 3, 3),
            "flu",
            vec![],
        )
        .await
        .unwrap();

        let routed = Model::decide(&db, request.id, prof.id, Decision::UnderReview, None)
            .await
            .unwrap();
        assert_eq!(routed.status, LeaveStatus::UnderReview);
        // Routing records no reviewer.
        assert!(routed.reviewer_id.is_none());

        // Re-routing an in-review request is not a legal transition.
        let err = Model::decide(&db, request.id, prof.id, Decision::UnderReview, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::StateViolation { .. }));

        let approved = Model::decide(
            &db,
            request.id,
            prof.id,
            Decision::Approved,
            Some("get well soon"),
        )
        .await
        .unwrap();
        assert_eq!(approved.status, LeaveStatus::Approved);
        assert_eq!(approved.reviewer_id, Some(prof.id));
        assert!(approved.reviewed_at.is_some());
        assert_eq!(approved.feedback.as_deref(), Some("get well soon"));

        let err = Model::decide(&db, request.id, prof.id, Decision::Rejected, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyDecided));
    }

    #[tokio::test]
    async fn withdraw_returns_handles_and_deletes() {
        let db = setup_test_db().await;
        let (prof, student, record) = absent_record(&db, RawStatus::Absent).await;

        let (request, _) = Model::file(
            &db,
            student.id,
            &record,
            date(2025, 3, 3),
            date(2025, 3, 3),
            "flu",
            vec![EvidenceMeta {
                filename: "note.pdf".into(),
                handle: "h1".into(),
                size: 1,
                content_type: "application/pdf".into(),
            }],
        )
        .await
        .unwrap();

        let handles = Model::withdraw(&db, request.id).await.unwrap();
        assert_eq!(handles, vec!["h1".to_string()]);
        assert!(Model::get_by_id(&db, request.id).await.unwrap().is_none());

        // A decided request cannot be withdrawn.
        let (request, _) = Model::file(
            &db,
            student.id,
            &record,
            date(2025, 3, 3),
            date(2025, 3, 3),
            "flu",
            vec![],
        )
        .await
        .unwrap();
        Model::decide(&db, request.id, prof.id, Decision::Approved, None)
            .await
            .unwrap();
        let err = Model::withdraw(&db, request.id).await.unwrap_err();
        assert!(matches!(err, DomainError::Immutable));
    }
}
