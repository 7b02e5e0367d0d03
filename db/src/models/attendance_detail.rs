use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Raw attendance fact as recorded, before any leave justification is applied.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display, EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RawStatus {
    #[sea_orm(string_value = "present")]
    Present,
    #[sea_orm(string_value = "late")]
    Late,
    #[sea_orm(string_value = "absent")]
    Absent,
    /// Absence with a medical ground.
    #[sea_orm(string_value = "medical")]
    Medical,
    /// Officially excused (e.g. university business).
    #[sea_orm(string_value = "official")]
    Official,
}

impl RawStatus {
    /// Statuses a student may contest through a leave request.
    pub fn requires_justification(self) -> bool {
        matches!(self, RawStatus::Late | RawStatus::Absent | RawStatus::Medical)
    }
}

/// How the raw fact was captured.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display, EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckMethod {
    #[sea_orm(string_value = "manual")]
    Manual,
    #[sea_orm(string_value = "qr")]
    Qr,
    #[sea_orm(string_value = "password")]
    Password,
    #[sea_orm(string_value = "auto")]
    Auto,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attendance_details")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub record_id: i64,
    pub status: RawStatus,
    pub method: CheckMethod,
    pub checked_at: DateTime<Utc>,
    pub requires_justification: bool,
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
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Record.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn find_for_record(db: &DbConn, record_id: i64) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::RecordId.eq(record_id))
            .one(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn justification_flag_follows_status() {
        assert!(!RawStatus::Present.requires_justification());
        assert!(!RawStatus::Official.requires_justification());
        assert!(RawStatus::Late.requires_justification());
        assert!(RawStatus::Absent.requires_justification());
        assert!(RawStatus::Medical.requires_justification());
    }

    #[test]
    fn statuses_parse_from_wire_names() {
        assert_eq!("present".parse::<RawStatus>().unwrap(), RawStatus::Present);
        assert_eq!("medical".parse::<RawStatus>().unwrap(), RawStatus::Medical);
        assert!("sleeping".parse::<RawStatus>().is_err());
        assert_eq!("qr".parse::<CheckMethod>().unwrap(), CheckMethod::Qr);
    }
}
