//! Config item service layer

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    prelude::Expr,
};
use tracing::info;

use bscp_api::ConfigItemInfo;
use bscp_common::{BscpError, BscpResult};
use bscp_persistence::{ConfigItemState, entity::config_items, storage_error, timed};

use super::{StoreContext, millis, now};

fn to_config_item_info(model: config_items::Model) -> ConfigItemInfo {
    ConfigItemInfo {
        id: model.id,
        biz_id: model.biz_id,
        app_id: model.app_id,
        name: model.name,
        path: model.path,
        file_type: model.file_type,
        state: model.state,
        memo: model.memo,
        creator: model.creator,
        created_at: millis(model.created_at),
        updated_at: millis(model.updated_at),
    }
}

async fn find_config_item<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    config_item_id: i64,
) -> BscpResult<config_items::Model> {
    config_items::Entity::find_by_id(config_item_id)
        .filter(config_items::Column::BizId.eq(biz_id))
        .one(conn)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| BscpError::not_found("config item", config_item_id))
}

/// Flip a config item to Released; idempotent.
pub(crate) async fn mark_released<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    config_item_id: i64,
    operator: &str,
) -> BscpResult<()> {
    let result = config_items::Entity::update_many()
        .col_expr(
            config_items::Column::State,
            Expr::value(ConfigItemState::Released.as_str()),
        )
        .col_expr(config_items::Column::LastModifyBy, Expr::value(operator))
        .col_expr(config_items::Column::UpdatedAt, Expr::value(now()))
        .filter(config_items::Column::Id.eq(config_item_id))
        .filter(config_items::Column::BizId.eq(biz_id))
        .exec(conn)
        .await
        .map_err(storage_error)?;

    if result.rows_affected == 0 {
        find_config_item(conn, biz_id, config_item_id).await?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct ConfigItemStore {
    ctx: StoreContext,
}

impl ConfigItemStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx }
    }

    pub async fn create(
        &self,
        biz_id: i64,
        app_id: i64,
        name: &str,
        path: &str,
        file_type: &str,
        memo: &str,
        operator: &str,
    ) -> BscpResult<i64> {
        let db = self.ctx.db(biz_id)?;
        let now = now();
        let entity = config_items::ActiveModel {
            biz_id: Set(biz_id),
            app_id: Set(app_id),
            name: Set(name.to_string()),
            path: Set(path.to_string()),
            file_type: Set(file_type.to_string()),
            state: Set(ConfigItemState::Init.as_str().to_string()),
            memo: Set(memo.to_string()),
            creator: Set(operator.to_string()),
            last_modify_by: Set(operator.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = timed(self.ctx.timeout(), "config_item.create", async {
            entity.insert(db).await.map_err(storage_error)
        })
        .await?;

        info!(biz_id, app_id, config_item_id = model.id, name, "Config item created");
        Ok(model.id)
    }

    pub async fn query(&self, biz_id: i64, config_item_id: i64) -> BscpResult<ConfigItemInfo> {
        let db = self.ctx.db(biz_id)?;
        timed(
            self.ctx.timeout(),
            "config_item.get",
            find_config_item(db, biz_id, config_item_id),
        )
        .await
        .map(to_config_item_info)
    }

    /// Every config item of an app, oldest first.
    pub async fn list(&self, biz_id: i64, app_id: i64) -> BscpResult<Vec<ConfigItemInfo>> {
        let db = self.ctx.db(biz_id)?;
        let models = timed(self.ctx.timeout(), "config_item.list", async {
            config_items::Entity::find()
                .filter(config_items::Column::BizId.eq(biz_id))
                .filter(config_items::Column::AppId.eq(app_id))
                .order_by_asc(config_items::Column::Id)
                .all(db)
                .await
                .map_err(storage_error)
        })
        .await?;

        Ok(models.into_iter().map(to_config_item_info).collect())
    }
}
