use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use db::checkin::{CheckInToken, TokenKind};
use db::models::attendance_detail::{self, CheckMethod, RawStatus};
use db::models::attendance_record::{self, BulkEntry, RecordView, StatusTally};
use db::models::leave_request;
use db::resolver::DerivedStatus;

/// One merged record as handed to clients: the canonical row, both
/// sub-records, and the derived display status.
#[derive(Debug, Serialize)]
pub struct RecordViewResponse {
    pub id: i64,
    pub course_id: i64,
    pub student_id: i64,
    pub date: NaiveDate,
    pub schedule_id: Option<i64>,
    pub notes: Option<String>,
    pub derived_status: DerivedStatus,
    pub detail: Option<DetailResponse>,
    pub leave: Option<LeaveSummary>,
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub status: RawStatus,
    pub method: CheckMethod,
    pub checked_at: String,
    pub requires_justification: bool,
}

impl From<attendance_detail::Model> for DetailResponse {
    fn from(m: attendance_detail::Model) -> Self {
        Self {
            status: m.status,
            method: m.method,
            checked_at: m.checked_at.to_rfc3339(),
            requires_justification: m.requires_justification,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeaveSummary {
    pub id: i64,
    pub status: leave_request::LeaveStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl From<leave_request::Model> for LeaveSummary {
    fn from(m: leave_request::Model) -> Self {
        Self {
            id: m.id,
            status: m.status,
            start_date: m.start_date,
            end_date: m.end_date,
        }
    }
}

impl From<RecordView> for RecordViewResponse {
    fn from(view: RecordView) -> Self {
        Self {
            id: view.record.id,
            course_id: view.record.course_id,
            student_id: view.record.student_id,
            date: view.record.date,
            schedule_id: view.record.schedule_id,
            notes: view.record.notes,
            derived_status: view.derived_status,
            detail: view.detail.map(DetailResponse::from),
            leave: view.leave.map(LeaveSummary::from),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IssueTokenReq {
    pub date: NaiveDate,
    pub kind: TokenKind,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: CheckInToken,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RedeemReq {
    pub token: CheckInToken,
}

#[derive(Debug, Deserialize)]
pub struct UpsertRecordReq {
    pub student_id: i64,
    pub date: NaiveDate,
    pub status: RawStatus,
    pub method: Option<CheckMethod>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkUpsertReq {
    pub date: NaiveDate,
    pub entries: Vec<BulkEntry>,
}

#[derive(Debug, Serialize)]
pub struct BulkOutcomeResponse {
    pub applied: Vec<RecordViewResponse>,
    pub skipped: Vec<attendance_record::SkippedEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RecordListQuery {
    pub date: Option<NaiveDate>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub student_id: Option<i64>,
    /// Raw stored status filter.
    pub status: Option<RawStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RecordListResponse {
    pub records: Vec<RecordViewResponse>,
    pub stats: StatusTally,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}
