//! Commit entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "commits")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub biz_id: i64,
    pub app_id: i64,
    pub cfgset_id: i64,
    pub content_id: Option<String>,
    pub content_size: Option<i64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub template: Option<String>,
    pub template_id: Option<i64>,
    pub multi_commit_id: i64,
    pub release_id: i64,
    pub state: String,
    pub memo: String,
    pub creator: String,
    pub last_modify_by: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
