use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use db::models::course;
use db::models::schedule_exception::{self, ExceptionKind};
use db::schedule::Occurrence;

#[derive(Debug, Serialize)]
pub struct ExceptionResponse {
    pub id: i64,
    pub course_id: i64,
    pub kind: ExceptionKind,
    pub date: NaiveDate,
    pub related_id: Option<i64>,
    pub related_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub week: i64,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<schedule_exception::Model> for ExceptionResponse {
    fn from(m: schedule_exception::Model) -> Self {
        Self {
            id: m.id,
            course_id: m.course_id,
            kind: m.kind,
            date: m.date,
            related_id: m.related_id,
            related_date: m.related_date,
            start_time: m.start_time,
            end_time: m.end_time,
            week: m.week,
            reason: m.reason,
            notes: m.notes,
            created_at: m.created_at.to_rfc3339(),
            updated_at: m.updated_at.to_rfc3339(),
        }
    }
}

/// What one calendar date means for the course, flattened for transport.
#[derive(Debug, Serialize)]
pub struct OccurrenceResponse {
    pub course_id: i64,
    pub date: NaiveDate,
    /// `regular`, `cancelled`, `makeup` or `no_class`.
    pub status: &'static str,
    pub has_class: bool,
    pub week: Option<i64>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    /// For a makeup: the cancelled date it replaces.
    pub related_date: Option<NaiveDate>,
    /// For a cancellation: the linked makeup date, when scheduled.
    pub makeup_date: Option<NaiveDate>,
    pub reason: Option<String>,
    pub exception: Option<ExceptionResponse>,
}

impl OccurrenceResponse {
    pub fn build(course: &course::Model, date: NaiveDate, occurrence: Occurrence) -> Self {
        match occurrence {
            Occurrence::NoClass => Self {
                course_id: course.id,
                date,
                status: "no_class",
                has_class: false,
                week: None,
                start_time: None,
                end_time: None,
                related_date: None,
                makeup_date: None,
                reason: None,
                exception: None,
            },
            Occurrence::Regular { week } => Self {
                course_id: course.id,
                date,
                status: "regular",
                has_class: true,
                week: Some(week),
                start_time: Some(course.start_time),
                end_time: Some(course.end_time),
                related_date: None,
                makeup_date: None,
                reason: None,
                exception: None,
            },
            Occurrence::Cancelled {
                exception,
                makeup_date,
            } => Self {
                course_id: course.id,
                date,
                status: "cancelled",
                has_class: false,
                week: Some(exception.week),
                start_time: None,
                end_time: None,
                related_date: None,
                makeup_date,
                reason: exception.reason.clone(),
                exception: Some(ExceptionResponse::from(exception)),
            },
            Occurrence::Makeup {
                exception,
                related_date,
            } => Self {
                course_id: course.id,
                date,
                status: "makeup",
                has_class: true,
                week: Some(exception.week),
                start_time: exception.start_time.or(Some(course.start_time)),
                end_time: exception.end_time.or(Some(course.end_time)),
                related_date: Some(related_date),
                makeup_date: None,
                reason: exception.reason.clone(),
                exception: Some(ExceptionResponse::from(exception)),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExceptionListQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
    /// `cancelled` or `makeup`.
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Comma-separated week numbers to leave out, e.g. `3,7`.
    pub skip_weeks: Option<String>,
}

impl CalendarQuery {
    pub fn skip_weeks_vec(&self) -> Vec<i64> {
        self.skip_weeks
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|w| w.trim().parse::<i64>().ok())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct CancellationReq {
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MakeupReq {
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}
