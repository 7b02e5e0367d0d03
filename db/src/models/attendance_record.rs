use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::{
    DatabaseTransaction, IntoActiveModel, PaginatorTrait, QueryOrder, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::models::attendance_detail::{self, CheckMethod, RawStatus};
use crate::models::{course, leave_request, schedule_exception};
use crate::resolver::{self, DerivedStatus};

/// Canonical attendance row, unique per (student, course, date). Owns up to
/// one raw detail and up to one leave request; the two are independent, a
/// leave request may justify an already-recorded absence.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub course_id: i64,
    pub student_id: i64,
    pub date: NaiveDate,
    /// Present when the record was taken against a makeup occurrence.
    pub schedule_id: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id",
        on_delete = "Cascade"
    )]
    Course,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::StudentId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Student,
    #[sea_orm(
        belongs_to = "super::schedule_exception::Entity",
        from = "Column::ScheduleId",
        to = "super::schedule_exception::Column::Id"
    )]
    Schedule,
    #[sea_orm(has_one = "super::attendance_detail::Entity")]
    Detail,
    #[sea_orm(has_one = "super::leave_request::Entity")]
    LeaveRequest,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::schedule_exception::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedule.def()
    }
}

impl Related<super::attendance_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Detail.def()
    }
}

impl Related<super::leave_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LeaveRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// A record merged with its sub-records and the derived display status.
#[derive(Clone, Debug, Serialize)]
pub struct RecordView {
    pub record: Model,
    pub detail: Option<attendance_detail::Model>,
    pub leave: Option<leave_request::Model>,
    pub derived_status: DerivedStatus,
}

impl RecordView {
    pub(crate) fn assemble(
        record: Model,
        detail: Option<attendance_detail::Model>,
        leave: Option<leave_request::Model>,
    ) -> Self {
        let derived_status = resolver::resolve(detail.as_ref(), leave.as_ref());
        Self {
            record,
            detail,
            leave,
            derived_status,
        }
    }
}

/// Per-status counts over a set of merged views, tallied on the derived
/// status so approved leaves count as present.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct StatusTally {
    pub total: u64,
    pub present: u64,
    pub late: u64,
    pub absent: u64,
    pub medical: u64,
    pub official: u64,
    pub unconfirmed: u64,
}

impl StatusTally {
    pub fn from_views(views: &[RecordView]) -> Self {
        let mut tally = StatusTally::default();
        for view in views {
            tally.total += 1;
            match view.derived_status {
                DerivedStatus::Present => tally.present += 1,
                DerivedStatus::Late => tally.late += 1,
                DerivedStatus::Absent => tally.absent += 1,
                DerivedStatus::Medical => tally.medical += 1,
                DerivedStatus::Official => tally.official += 1,
                DerivedStatus::Unconfirmed => tally.unconfirmed += 1,
            }
        }
        tally
    }
}

/// Filters for [`Model::query`]. All fields are optional and combine with AND.
#[derive(Debug, Default, Clone)]
pub struct RecordFilter {
    pub student_id: Option<i64>,
    pub course_id: Option<i64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Matches the stored raw status, not the derived one.
    pub status: Option<RawStatus>,
    pub page: u64,
    pub per_page: u64,
}

/// One page of merged views. The query is restartable: the same filter and
/// page yield the same rows again.
#[derive(Debug, Serialize)]
pub struct RecordPage {
    pub views: Vec<RecordView>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}

/// One entry of a bulk upsert.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkEntry {
    pub student_id: i64,
    pub status: RawStatus,
    pub notes: Option<String>,
}

/// Bulk outcome: applied views plus the entries that were skipped. The batch
/// tolerates partial success by design, unlike the single-entry upsert which
/// is strictly atomic.
#[derive(Debug, Serialize)]
pub struct BulkOutcome {
    pub applied: Vec<RecordView>,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Serialize)]
pub struct SkippedEntry {
    pub student_id: i64,
    pub reason: String,
}

impl Model {
    pub async fn find_by_key(
        db: &DbConn,
        student_id: i64,
        course_id: i64,
        date: NaiveDate,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::CourseId.eq(course_id))
            .filter(Column::Date.eq(date))
            .one(db)
            .await
    }

    pub async fn get_by_id(db: &DbConn, id: i64) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    /// Whether any record exists for (course, date). Used as the guard against
    /// cancelling or deleting an occurrence that already has attendance.
    pub async fn any_on_date(db: &DbConn, course_id: i64, date: NaiveDate) -> Result<bool, DbErr> {
        let count = Entity::find()
            .filter(Column::CourseId.eq(course_id))
            .filter(Column::Date.eq(date))
            .count(db)
            .await?;
        Ok(count > 0)
    }

    /// Count of records taken against a specific persisted occurrence.
    pub async fn count_for_schedule(db: &DbConn, schedule_id: i64) -> Result<u64, DbErr> {
        Entity::find()
            .filter(Column::ScheduleId.eq(schedule_id))
            .count(db)
            .await
    }

    /// Creates or updates the record and its raw detail for one student.
    ///
    /// The write is a single transaction: on any failure nothing changes.
    /// `requires_justification` is recomputed from the new status. Writing to
    /// a date the course has cancelled fails with `ClassCancelled`.
    pub async fn upsert(
        db: &DbConn,
        student_id: i64,
        course: &course::Model,
        date: NaiveDate,
        status: RawStatus,
        method: CheckMethod,
        notes: Option<&str>,
    ) -> DomainResult<RecordView> {
        let exception = schedule_exception::Model::find_on_date(db, course.id, date).await?;
        if exception.as_ref().is_some_and(|e| e.is_cancellation()) {
            return Err(DomainError::ClassCancelled);
        }
        let schedule_id = exception.filter(|e| e.is_makeup()).map(|e| e.id);

        let txn = db.begin().await?;
        let now = Utc::now();
        let record =
            Self::ensure_record(&txn, student_id, course.id, date, schedule_id, notes, now).await?;
        let detail = Self::write_detail(&txn, record.id, status, method, now).await?;
        txn.commit().await?;

        let leave = leave_request::Model::find_for_record(db, record.id).await?;
        Ok(RecordView::assemble(record, Some(detail), leave))
    }

    /// Applies [`Model::upsert`] per entry. Each entry is atomic on its own;
    /// entries that fail are skipped with a reason rather than aborting the
    /// batch. A cancelled date still rejects the batch as a whole, since no
    /// entry could succeed.
    pub async fn bulk_upsert(
        db: &DbConn,
        course: &course::Model,
        date: NaiveDate,
        entries: Vec<BulkEntry>,
    ) -> DomainResult<BulkOutcome> {
        let exception = schedule_exception::Model::find_on_date(db, course.id, date).await?;
        if exception.is_some_and(|e| e.is_cancellation()) {
            return Err(DomainError::ClassCancelled);
        }

        let mut outcome = BulkOutcome {
            applied: Vec::new(),
            skipped: Vec::new(),
        };

        for entry in entries {
            match Self::upsert(
                db,
                entry.student_id,
                course,
                date,
                entry.status,
                CheckMethod::Manual,
                entry.notes.as_deref(),
            )
            .await
            {
                Ok(view) => outcome.applied.push(view),
                Err(err) => {
                    tracing::warn!(
                        student_id = entry.student_id,
                        course_id = course.id,
                        %date,
                        error = %err,
                        "bulk upsert entry skipped"
                    );
                    outcome.skipped.push(SkippedEntry {
                        student_id: entry.student_id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Pages through merged record views matching `filter`, ordered by date
    /// descending then student. Restartable: no cursor state is kept.
    pub async fn query(db: &DbConn, filter: RecordFilter) -> DomainResult<RecordPage> {
        let page = filter.page.max(1);
        let per_page = filter.per_page.clamp(1, 200);

        let mut select = Entity::find();
        if let Some(student_id) = filter.student_id {
            select = select.filter(Column::StudentId.eq(student_id));
        }
        if let Some(course_id) = filter.course_id {
            select = select.filter(Column::CourseId.eq(course_id));
        }
        if let Some(from) = filter.date_from {
            select = select.filter(Column::Date.gte(from));
        }
        if let Some(to) = filter.date_to {
            select = select.filter(Column::Date.lte(to));
        }
        if let Some(status) = filter.status {
            // Raw-status filtering narrows the page itself, so totals stay honest.
            let ids: Vec<i64> = attendance_detail::Entity::find()
                .filter(attendance_detail::Column::Status.eq(status))
                .all(db)
                .await?
                .into_iter()
                .map(|d| d.record_id)
                .collect();
            select = select.filter(Column::Id.is_in(ids));
        }
        select = select
            .order_by_desc(Column::Date)
            .order_by_asc(Column::StudentId);

        let paginator = select.paginate(db, per_page);
        let total = paginator.num_items().await?;
        let records = paginator.fetch_page(page - 1).await?;

        let views = Self::load_views(db, records).await?;

        Ok(RecordPage {
            views,
            page,
            per_page,
            total,
        })
    }

    /// Merged view of one record.
    pub async fn view(db: &DbConn, record: Model) -> DomainResult<RecordView> {
        let detail = attendance_detail::Model::find_for_record(db, record.id).await?;
        let leave = leave_request::Model::find_for_record(db, record.id).await?;
        Ok(RecordView::assemble(record, detail, leave))
    }

    async fn load_views(db: &DbConn, records: Vec<Model>) -> Result<Vec<RecordView>, DbErr> {
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();

        let details = attendance_detail::Entity::find()
            .filter(attendance_detail::Column::RecordId.is_in(ids.clone()))
            .all(db)
            .await?;
        let leaves = leave_request::Entity::find()
            .filter(leave_request::Column::RecordId.is_in(ids))
            .all(db)
            .await?;

        Ok(records
            .into_iter()
            .map(|record| {
                let detail = details.iter().find(|d| d.record_id == record.id).cloned();
                let leave = leaves.iter().find(|l| l.record_id == record.id).cloned();
                RecordView::assemble(record, detail, leave)
            })
            .collect())
    }

    /// Finds or creates the canonical row for the key inside `txn`.
    ///
    /// A concurrent creator for the same key loses the race on the unique
    /// index; the loser re-reads the winner's row instead of erroring, so
    /// callers never observe a duplicate.
    pub(crate) async fn ensure_record(
        txn: &DatabaseTransaction,
        student_id: i64,
        course_id: i64,
        date: NaiveDate,
        schedule_id: Option<i64>,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> DomainResult<Model> {
        let existing = Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::CourseId.eq(course_id))
            .filter(Column::Date.eq(date))
            .one(txn)
            .await?;

        if let Some(record) = existing {
            let mut active = record.clone().into_active_model();
            if let Some(notes) = notes {
                active.notes = Set(Some(notes.to_owned()));
            }
            if schedule_id.is_some() {
                active.schedule_id = Set(schedule_id);
            }
            active.updated_at = Set(now);
            return Ok(active.update(txn).await?);
        }

        let insert = ActiveModel {
            course_id: Set(course_id),
            student_id: Set(student_id),
            date: Set(date),
            schedule_id: Set(schedule_id),
            notes: Set(notes.map(|n| n.to_owned())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(txn)
        .await;

        match insert {
            Ok(record) => Ok(record),
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Entity::find()
                    .filter(Column::StudentId.eq(student_id))
                    .filter(Column::CourseId.eq(course_id))
                    .filter(Column::Date.eq(date))
                    .one(txn)
                    .await?
                    .ok_or(DomainError::ServiceUnavailable(err))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Writes the raw detail for `record_id` inside `txn`, creating or
    /// replacing it and recomputing the justification flag.
    pub(crate) async fn write_detail(
        txn: &DatabaseTransaction,
        record_id: i64,
        status: RawStatus,
        method: CheckMethod,
        now: DateTime<Utc>,
    ) -> DomainResult<attendance_detail::Model> {
        let existing = attendance_detail::Entity::find()
            .filter(attendance_detail::Column::RecordId.eq(record_id))
            .one(txn)
            .await?;

        let detail = match existing {
            Some(detail) => {
                let mut active = detail.into_active_model();
                active.status = Set(status);
                active.method = Set(method);
                active.checked_at = Set(now);
                active.requires_justification = Set(status.requires_justification());
                active.updated_at = Set(now);
                active.update(txn).await?
            }
            None => {
                attendance_detail::ActiveModel {
                    record_id: Set(record_id),
                    status: Set(status),
                    method: Set(method),
                    checked_at: Set(now),
                    requires_justification: Set(status.requires_justification()),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?
            }
        };

        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{self, UserType};
    use crate::test_utils::setup_test_db;
    use chrono::NaiveTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn fixture(db: &DbConn) -> (user::Model, user::Model, course::Model) {
        let prof = user::Model::create(db, "prof", "prof@uni.test", UserType::Professor)
            .await
            .unwrap();
        let student = user::Model::create(db, "stu", "stu@uni.test", UserType::Student)
            .await
            .unwrap();
        let course = course::Model::create(
            db,
            prof.id,
            "Algorithms",
            "ALG301",
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
    async fn upsert_creates_record_and_detail() {
        let db = setup_test_db().await;
        let (_, student, course) = fixture(&db).await;

        let view = Model::upsert(
            &db,
            student.id,
            &course,
            date(2025, 3, 3),
            RawStatus::Present,
            CheckMethod::Manual,
            Some("front row"),
        )
        .await
        .unwrap();

        assert_eq!(view.record.student_id, student.id);
        assert_eq!(view.record.notes.as_deref(), Some("front row"));
        let detail = view.detail.unwrap();
        assert_eq!(detail.status, RawStatus::Present);
        assert!(!detail.requires_justification);
        assert_eq!(view.derived_status, DerivedStatus::Present);
    }

    #[tokio::test]
    async fn upsert_updates_in_place_and_recomputes_flag() {
        let db = setup_test_db().await;
        let (_, student, course) = fixture(&db).await;
        let day = date(2025, 3, 3);

        let first = Model::upsert(
            &db,
            student.id,
            &course,
            day,
            RawStatus::Present,
            CheckMethod::Qr,
            None,
        )
        .await
        .unwrap();

        let second = Model::upsert(
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

        // Same canonical row, updated detail.
        assert_eq!(first.record.id, second.record.id);
        let detail = second.detail.unwrap();
        assert_eq!(detail.status, RawStatus::Absent);
        assert!(detail.requires_justification);

        let count = Entity::find()
            .filter(Column::StudentId.eq(student.id))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn upsert_rejects_cancelled_date() {
        let db = setup_test_db().await;
        let (_, student, course) = fixture(&db).await;
        let day = date(2025, 3, 10);

        crate::schedule::create_cancellation(&db, &course, day, Some("holiday"), None)
            .await
            .unwrap();

        let err = Model::upsert(
            &db,
            student.id,
            &course,
            day,
            RawStatus::Present,
            CheckMethod::Manual,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DomainError::ClassCancelled));
    }

    #[tokio::test]
    async fn bulk_upsert_skips_bad_entries() {
        let db = setup_test_db().await;
        let (_, student, course) = fixture(&db).await;
        let day = date(2025, 3, 5);

        let entries = vec![
            BulkEntry {
                student_id: student.id,
                status: RawStatus::Present,
                notes: None,
            },
            // Unknown student: FK failure, skipped not fatal.
            BulkEntry {
                student_id: 9999,
                status: RawStatus::Late,
                notes: None,
            },
        ];

        let outcome = Model::bulk_upsert(&db, &course, day, entries).await.unwrap();
        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].student_id, 9999);
    }

    #[tokio::test]
    async fn query_filters_and_pages() {
        let db = setup_test_db().await;
        let (_, student, course) = fixture(&db).await;

        for (day, status) in [
            (date(2025, 3, 3), RawStatus::Present),
            (date(2025, 3, 5), RawStatus::Absent),
            (date(2025, 3, 10), RawStatus::Late),
        ] {
            Model::upsert(
                &db,
                student.id,
                &course,
                day,
                status,
                CheckMethod::Manual,
                None,
            )
            .await
            .unwrap();
        }

        let page = Model::query(
            &db,
            RecordFilter {
                course_id: Some(course.id),
                page: 1,
                per_page: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.total, 3);
        // Newest first.
        assert_eq!(page.views[0].record.date, date(2025, 3, 10));

        let absents = Model::query(
            &db,
            RecordFilter {
                course_id: Some(course.id),
                status: Some(RawStatus::Absent),
                page: 1,
                per_page: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(absents.views.len(), 1);
        assert_eq!(absents.views[0].record.date, date(2025, 3, 5));

        // Restartable: same filter, same rows.
        let again = Model::query(
            &db,
            RecordFilter {
                course_id: Some(course.id),
                status: Some(RawStatus::Absent),
                page: 1,
                per_page: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(again.views[0].record.id, absents.views[0].record.id);

        let tally = StatusTally::from_views(&page.views);
        assert_eq!(tally.total, 3);
        assert_eq!(tally.present, 1);
        assert_eq!(tally.absent, 1);
        assert_eq!(tally.late, 1);
    }
}
