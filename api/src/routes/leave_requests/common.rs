use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use db::models::leave_evidence;
use db::models::leave_request::{self, LeaveStatus};

#[derive(Debug, Serialize)]
pub struct EvidenceResponse {
    pub id: i64,
    pub filename: String,
    pub size: i64,
    pub content_type: String,
}

impl From<leave_evidence::Model> for EvidenceResponse {
    fn from(m: leave_evidence::Model) -> Self {
        Self {
            id: m.id,
            filename: m.filename,
            size: m.size,
            content_type: m.content_type,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeaveResponse {
    pub id: i64,
    pub record_id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: LeaveStatus,
    pub feedback: Option<String>,
    pub reviewer_id: Option<i64>,
    pub reviewed_at: Option<String>,
    pub evidence: Vec<EvidenceResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl LeaveResponse {
    pub fn from_parts(m: leave_request::Model, evidence: Vec<leave_evidence::Model>) -> Self {
        Self {
            id: m.id,
            record_id: m.record_id,
            student_id: m.student_id,
            course_id: m.course_id,
            start_date: m.start_date,
            end_date: m.end_date,
            reason: m.reason,
            status: m.status,
            feedback: m.feedback,
            reviewer_id: m.reviewer_id,
            reviewed_at: m.reviewed_at.map(|t| t.to_rfc3339()),
            evidence: evidence.into_iter().map(EvidenceResponse::from).collect(),
            created_at: m.created_at.to_rfc3339(),
            updated_at: m.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LeaveListQuery {
    pub status: Option<String>,
    pub student_id: Option<i64>,
    pub course_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionReq {
    /// `approved`, `rejected` or `under_review`.
    pub decision: String,
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditLeaveReq {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub reason: Option<String>,
}
