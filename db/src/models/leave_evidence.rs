use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One piece of supporting evidence attached to a leave request. The bytes
/// live in the evidence blob store; this row only keeps the handle.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "leave_evidence")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub request_id: i64,
    pub filename: String,
    pub handle: String,
    pub size: i64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::leave_request::Entity",
        from = "Column::RequestId",
        to = "super::leave_request::Column::Id",
        on_delete = "Cascade"
    )]
    Request,
}

impl Related<super::leave_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Request.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn list_for_request(db: &DbConn, request_id: i64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::RequestId.eq(request_id))
            .all(db)
            .await
    }
}
