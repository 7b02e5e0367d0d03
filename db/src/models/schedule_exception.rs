use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::QueryOrder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A persisted deviation from the recurring schedule. Regular meetings are
/// computed from the course pattern and never stored here.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display, EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExceptionKind {
    /// A regular meeting that will not take place.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    /// A replacement meeting for a cancelled one.
    #[sea_orm(string_value = "makeup")]
    Makeup,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "schedule_exceptions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub course_id: i64,
    pub kind: ExceptionKind,
    pub date: NaiveDate,
    /// For a makeup: the cancellation it replaces. Unique, so a cancellation
    /// gets at most one makeup.
    pub related_id: Option<i64>,
    pub related_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub week: i64,
    pub reason: Option<String>,
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
        belongs_to = "Entity",
        from = "Column::RelatedId",
        to = "Column::Id"
    )]
    Related,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    AttendanceRecords,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AttendanceRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Optional filters for listing a course's exceptions.
#[derive(Debug, Default, Clone)]
pub struct ExceptionFilter {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub kind: Option<ExceptionKind>,
}

impl Model {
    pub async fn get_by_id(db: &DbConn, id: i64) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    /// The single exception on (course, date), if any.
    pub async fn find_on_date(
        db: &DbConn,
        course_id: i64,
        date: NaiveDate,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::CourseId.eq(course_id))
            .filter(Column::Date.eq(date))
            .one(db)
            .await
    }

    /// The makeup linked to a cancellation, if one exists.
    pub async fn find_makeup_for(
        db: &DbConn,
        cancellation_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::RelatedId.eq(cancellation_id))
            .one(db)
            .await
    }

    /// All exceptions for a course, optionally narrowed by year/month/kind,
    /// ordered by date.
    pub async fn list_for_course(
        db: &DbConn,
        course_id: i64,
        filter: ExceptionFilter,
    ) -> Result<Vec<Model>, DbErr> {
        let mut select = Entity::find().filter(Column::CourseId.eq(course_id));

        if let Some(kind) = filter.kind {
            select = select.filter(Column::Kind.eq(kind));
        }

        let rows = select.order_by_asc(Column::Date).all(db).await?;

        // Year/month narrowing happens here; SQLite stores dates as text and
        // the row counts per course are small.
        Ok(rows
            .into_iter()
            .filter(|m| filter.year.is_none_or(|y| m.date.year() == y))
            .filter(|m| filter.month.is_none_or(|mo| m.date.month() == mo))
            .collect())
    }

    pub fn is_cancellation(&self) -> bool {
        self.kind == ExceptionKind::Cancelled
    }

    pub fn is_makeup(&self) -> bool {
        self.kind == ExceptionKind::Makeup
    }
}
