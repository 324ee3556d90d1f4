//! Multi release entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "multi_releases")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub biz_id: i64,
    pub app_id: i64,
    pub multi_commit_id: i64,
    pub strategy_id: i64,
    pub name: String,
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
