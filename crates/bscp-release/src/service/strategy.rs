//! Strategy service layer
//!
//! Strategy content is validated and normalized on creation so every stored
//! row parses back into a [`Predicate`].

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::info;

use bscp_api::StrategyInfo;
use bscp_common::{BscpError, BscpResult, EMPTY_STRATEGY};
use bscp_persistence::{entity::strategies, storage_error, timed};

use super::{StoreContext, millis, now};
use crate::model::Predicate;

async fn find_strategy<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    strategy_id: i64,
) -> BscpResult<strategies::Model> {
    strategies::Entity::find_by_id(strategy_id)
        .filter(strategies::Column::BizId.eq(biz_id))
        .one(conn)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| BscpError::not_found("strategy", strategy_id))
}

/// Serialized predicate a new release snapshots; id 0 is the empty strategy.
pub(crate) async fn strategy_snapshot<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    app_id: i64,
    strategy_id: i64,
) -> BscpResult<String> {
    if strategy_id == 0 {
        return Ok(EMPTY_STRATEGY.to_string());
    }

    let strategy = find_strategy(conn, biz_id, strategy_id).await?;
    if strategy.app_id != app_id {
        return Err(BscpError::InvalidInput(format!(
            "strategy {} does not belong to app {}",
            strategy_id, app_id
        )));
    }
    Ok(Predicate::parse_str(&strategy.content)?.to_stored())
}

#[derive(Clone)]
pub struct StrategyStore {
    ctx: StoreContext,
}

impl StrategyStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx }
    }

    pub async fn create(
        &self,
        biz_id: i64,
        app_id: i64,
        name: &str,
        content: &serde_json::Value,
        memo: &str,
        operator: &str,
    ) -> BscpResult<i64> {
        let predicate = Predicate::parse(content)?;
        let db = self.ctx.db(biz_id)?;

        let now = now();
        let entity = strategies::ActiveModel {
            biz_id: Set(biz_id),
            app_id: Set(app_id),
            name: Set(name.to_string()),
            content: Set(predicate.to_stored()),
            memo: Set(memo.to_string()),
            creator: Set(operator.to_string()),
            last_modify_by: Set(operator.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = timed(self.ctx.timeout(), "strategy.create", async {
            entity.insert(db).await.map_err(storage_error)
        })
        .await?;

        info!(biz_id, app_id, strategy_id = model.id, name, "Strategy created");
        Ok(model.id)
    }

    pub async fn query(&self, biz_id: i64, strategy_id: i64) -> BscpResult<StrategyInfo> {
        let db = self.ctx.db(biz_id)?;
        let model = timed(
            self.ctx.timeout(),
            "strategy.get",
            find_strategy(db, biz_id, strategy_id),
        )
        .await?;

        let content = serde_json::from_str(&model.content).map_err(|e| {
            BscpError::InternalError(format!("stored strategy {} is corrupt: {}", model.id, e))
        })?;

        Ok(StrategyInfo {
            id: model.id,
            biz_id: model.biz_id,
            app_id: model.app_id,
            name: model.name,
            content,
            memo: model.memo,
            creator: model.creator,
            created_at: millis(model.created_at),
        })
    }
}
