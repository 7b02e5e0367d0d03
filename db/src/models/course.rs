use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::QueryOrder;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A course and its weekly recurrence pattern. Meeting weekdays are stored as
/// a comma-separated list of short names (`Mon,Wed`); regular occurrences are
/// derived from this pattern on demand and never persisted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub code: String,
    pub semester: String,
    pub department: String,
    pub owner_id: i64,
    pub days_of_week: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub room: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Owner,
    #[sea_orm(has_many = "super::schedule_exception::Entity")]
    ScheduleExceptions,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    AttendanceRecords,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::schedule_exception::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduleExceptions.def()
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AttendanceRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Partial update for [`Model::update`]; `None` leaves a field untouched.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CourseChanges {
    pub name: Option<String>,
    pub room: Option<String>,
    pub description: Option<String>,
    pub days_of_week: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

impl Model {
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        db: &DbConn,
        owner_id: i64,
        name: &str,
        code: &str,
        semester: &str,
        department: &str,
        days_of_week: &str,
        start_time: NaiveTime,
        end_time: NaiveTime,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> DomainResult<Model> {
        parse_days(days_of_week)?;
        if end_date < start_date {
            return Err(DomainError::validation("end date is before start date"));
        }
        if end_time <= start_time {
            return Err(DomainError::validation("end time is not after start time"));
        }

        let now = Utc::now();
        let course = ActiveModel {
            owner_id: Set(owner_id),
            name: Set(name.to_owned()),
            code: Set(code.to_owned()),
            semester: Set(semester.to_owned()),
            department: Set(department.to_owned()),
            days_of_week: Set(normalize_days(days_of_week)?),
            start_time: Set(start_time),
            end_time: Set(end_time),
            start_date: Set(start_date),
            end_date: Set(end_date),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        Ok(course.insert(db).await?)
    }

    pub async fn get_by_id(db: &DbConn, id: i64) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    pub async fn list_by_owner(db: &DbConn, owner_id: i64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::OwnerId.eq(owner_id))
            .order_by_asc(Column::Code)
            .all(db)
            .await
    }

    pub async fn delete(db: &DbConn, id: i64) -> Result<(), DbErr> {
        Entity::delete_by_id(id).exec(db).await?;
        Ok(())
    }

    /// Applies the non-`None` changes to the course row.
    pub async fn update(db: &DbConn, id: i64, changes: CourseChanges) -> DomainResult<Model> {
        let course = Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DomainError::NotFound("course"))?;

        let start_date = changes.start_date.unwrap_or(course.start_date);
        let end_date = changes.end_date.unwrap_or(course.end_date);
        if end_date < start_date {
            return Err(DomainError::validation("end date is before start date"));
        }

        let mut active: ActiveModel = course.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(room) = changes.room {
            active.room = Set(Some(room));
        }
        if let Some(description) = changes.description {
            active.description = Set(Some(description));
        }
        if let Some(days) = changes.days_of_week {
            active.days_of_week = Set(normalize_days(&days)?);
        }
        if let Some(start_time) = changes.start_time {
            active.start_time = Set(start_time);
        }
        if let Some(end_time) = changes.end_time {
            active.end_time = Set(end_time);
        }
        active.start_date = Set(start_date);
        active.end_date = Set(end_date);
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(db).await?)
    }

    /// The parsed weekly meeting pattern.
    pub fn meeting_days(&self) -> Vec<Weekday> {
        self.days_of_week
            .split(',')
            .filter_map(|d| d.trim().parse::<Weekday>().ok())
            .collect()
    }

    /// Whether the recurrence pattern puts a meeting on `date`'s weekday.
    pub fn meets_on(&self, date: NaiveDate) -> bool {
        self.meeting_days().contains(&date.weekday())
    }

    /// Whether `date` falls inside the course's active range (inclusive).
    pub fn in_term(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Week number of `date`, counted in 7-day bins from the course start
    /// date. The first bin is week 1; a bin counts whether or not it contained
    /// a meeting day. Dates before the start clamp to week 1.
    pub fn week_number(&self, date: NaiveDate) -> i64 {
        let diff = (date - self.start_date).num_days();
        if diff < 0 { 1 } else { diff / 7 + 1 }
    }
}

fn parse_days(days: &str) -> DomainResult<Vec<Weekday>> {
    let parsed: Vec<Weekday> = days
        .split(',')
        .map(|d| {
            d.trim()
                .parse::<Weekday>()
                .map_err(|_| DomainError::validation(format!("invalid weekday: {}", d.trim())))
        })
        .collect::<DomainResult<_>>()?;

    if parsed.is_empty() {
        return Err(DomainError::validation("at least one meeting day required"));
    }
    Ok(parsed)
}

fn normalize_days(days: &str) -> DomainResult<String> {
    Ok(parse_days(days)?
        .into_iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{self, UserType};
    use crate::test_utils::setup_test_db;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn owner(db: &DbConn) -> user::Model {
        user::Model::create(db, "prof", "prof@uni.test", UserType::Professor)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_parses_and_normalizes_days() {
        let db = setup_test_db().await;
        let prof = owner(&db).await;

        let course = Model::create(
            &db,
            prof.id,
            "Operating Systems",
            "OS301",
            "2025-1",
            "CS",
            "monday, wed",
            time(9, 0),
            time(10, 0),
            date(2025, 3, 3),
            date(2025, 6, 20),
        )
        .await
        .unwrap();

        assert_eq!(course.days_of_week, "Mon,Wed");
        assert_eq!(course.meeting_days(), vec![Weekday::Mon, Weekday::Wed]);
        assert!(course.meets_on(date(2025, 3, 5)));
        assert!(!course.meets_on(date(2025, 3, 4)));
    }

    #[tokio::test]
    async fn create_rejects_bad_input() {
        let db = setup_test_db().await;
        let prof = owner(&db).await;

        let bad_day = Model::create(
            &db,
            prof.id,
            "X",
            "X1",
            "2025-1",
            "CS",
            "Funday",
            time(9, 0),
            time(10, 0),
            date(2025, 3, 3),
            date(2025, 6, 20),
        )
        .await;
        assert!(matches!(bad_day, Err(DomainError::Validation(_))));

        let bad_range = Model::create(
            &db,
            prof.id,
            "X",
            "X2",
            "2025-1",
            "CS",
            "Mon",
            time(9, 0),
            time(10, 0),
            date(2025, 6, 20),
            date(2025, 3, 3),
        )
        .await;
        assert!(matches!(bad_range, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn week_numbers_count_seven_day_bins_from_start() {
        let db = setup_test_db().await;
        let prof = owner(&db).await;

        // Starts on a Monday.
        let course = Model::create(
            &db,
            prof.id,
            "Databases",
            "DB201",
            "2025-1",
            "CS",
            "Mon,Wed",
            time(9, 0),
            time(10, 0),
            date(2025, 3, 3),
            date(2025, 6, 20),
        )
        .await
        .unwrap();

        assert_eq!(course.week_number(date(2025, 3, 3)), 1);
        assert_eq!(course.week_number(date(2025, 3, 9)), 1);
        assert_eq!(course.week_number(date(2025, 3, 10)), 2);
        assert_eq!(course.week_number(date(2025, 3, 31)), 5);
        // Before the start date clamps to week 1.
        assert_eq!(course.week_number(date(2025, 3, 1)), 1);
    }
}
