use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use db::models::course;

#[derive(Debug, Serialize)]
pub struct CourseResponse {
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
    pub created_at: String,
    pub updated_at: String,
}

impl From<course::Model> for CourseResponse {
    fn from(m: course::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            code: m.code,
            semester: m.semester,
            department: m.department,
            owner_id: m.owner_id,
            days_of_week: m.days_of_week,
            start_time: m.start_time,
            end_time: m.end_time,
            start_date: m.start_date,
            end_date: m.end_date,
            room: m.room,
            description: m.description,
            is_active: m.is_active,
            created_at: m.created_at.to_rfc3339(),
            updated_at: m.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseReq {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 32, message = "code must be 1-32 characters"))]
    pub code: String,
    #[validate(length(min = 1, max = 32, message = "semester must be 1-32 characters"))]
    pub semester: String,
    #[validate(length(min = 1, max = 100, message = "department must be 1-100 characters"))]
    pub department: String,
    /// Comma-separated weekday names, e.g. `Mon,Wed`.
    pub days_of_week: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub room: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCourseReq {
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

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub owner_id: Option<i64>,
    pub active: Option<bool>,
}
