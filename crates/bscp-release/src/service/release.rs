//! Release service layer
//!
//! A release snapshots a confirmed commit together with the targeting
//! predicate of its strategy. Publishing is one transaction over three
//! updates: the release becomes Published, its commit records the release
//! id, and the config item flips to Released.

#![allow(clippy::too_many_arguments)]

use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, prelude::Expr,
};
use tracing::{info, warn};

use bscp_api::{ContentRef, ReleaseInfo};
use bscp_common::{BscpError, BscpResult};
use bscp_persistence::{CommitState, Page, ReleaseState, entity::releases, storage_error, timed};

use super::{
    StoreContext, begin,
    commit::{find_commit, stamp_release, to_commit_info},
    config_item::mark_released,
    finish, millis, now,
    strategy::strategy_snapshot,
};
use crate::model::{LabelMatcher, Predicate};

pub(crate) fn to_release_info(model: releases::Model) -> ReleaseInfo {
    ReleaseInfo {
        id: model.id,
        biz_id: model.biz_id,
        app_id: model.app_id,
        cfg_id: model.cfg_id,
        commit_id: model.commit_id,
        name: model.name,
        strategy_id: model.strategy_id,
        strategies: model.strategies,
        multi_release_id: model.multi_release_id,
        state: model.state,
        memo: model.memo,
        creator: model.creator,
        last_modify_by: model.last_modify_by,
        created_at: millis(model.created_at),
        updated_at: millis(model.updated_at),
    }
}

pub(crate) async fn find_release<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    release_id: i64,
) -> BscpResult<releases::Model> {
    releases::Entity::find_by_id(release_id)
        .filter(releases::Column::BizId.eq(biz_id))
        .one(conn)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| BscpError::not_found("release", release_id))
}

pub(crate) async fn find_members<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    multi_release_id: i64,
) -> BscpResult<Vec<releases::Model>> {
    releases::Entity::find()
        .filter(releases::Column::BizId.eq(biz_id))
        .filter(releases::Column::MultiReleaseId.eq(multi_release_id))
        .order_by_asc(releases::Column::Id)
        .all(conn)
        .await
        .map_err(storage_error)
}

pub(crate) async fn transition<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    release_id: i64,
    from: &[ReleaseState],
    to: ReleaseState,
    operator: &str,
) -> BscpResult<()> {
    let result = releases::Entity::update_many()
        .col_expr(releases::Column::State, Expr::value(to.as_str()))
        .col_expr(releases::Column::LastModifyBy, Expr::value(operator))
        .col_expr(releases::Column::UpdatedAt, Expr::value(now()))
        .filter(releases::Column::Id.eq(release_id))
        .filter(releases::Column::BizId.eq(biz_id))
        .filter(releases::Column::State.is_in(from.iter().map(|s| s.as_str())))
        .exec(conn)
        .await
        .map_err(storage_error)?;

    if result.rows_affected > 0 {
        return Ok(());
    }

    let current: ReleaseState = find_release(conn, biz_id, release_id)
        .await?
        .state
        .parse()?;
    if current == to {
        return Ok(());
    }
    Err(BscpError::illegal_transition("release", release_id, current, to))
}

/// Insert one Init release cut from a confirmed commit.
pub(crate) async fn insert_release<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    app_id: i64,
    commit_id: i64,
    strategy_id: i64,
    strategies: &str,
    name: &str,
    memo: &str,
    multi_release_id: i64,
    operator: &str,
) -> BscpResult<i64> {
    let commit = find_commit(conn, biz_id, commit_id).await?;
    if commit.app_id != app_id {
        return Err(BscpError::InvalidInput(format!(
            "commit {} does not belong to app {}",
            commit_id, app_id
        )));
    }
    let state: CommitState = commit.state.parse()?;
    if state != CommitState::Confirmed {
        return Err(BscpError::illegal_transition(
            "commit", commit_id, state, "Released",
        ));
    }

    let now = now();
    let entity = releases::ActiveModel {
        biz_id: Set(biz_id),
        app_id: Set(app_id),
        cfg_id: Set(commit.cfgset_id),
        commit_id: Set(commit_id),
        name: Set(name.to_string()),
        strategy_id: Set(strategy_id),
        strategies: Set(strategies.to_string()),
        multi_release_id: Set(multi_release_id),
        state: Set(ReleaseState::Init.as_str().to_string()),
        memo: Set(memo.to_string()),
        creator: Set(operator.to_string()),
        last_modify_by: Set(operator.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let model = entity.insert(conn).await.map_err(storage_error)?;
    Ok(model.id)
}

/// The three publishing steps, run on an open transaction.
pub(crate) async fn publish_in<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    release_id: i64,
    operator: &str,
) -> BscpResult<releases::Model> {
    let mut release = find_release(conn, biz_id, release_id).await?;

    transition(
        conn,
        biz_id,
        release_id,
        &[ReleaseState::Init],
        ReleaseState::Published,
        operator,
    )
    .await?;
    stamp_release(conn, biz_id, release.commit_id, release_id, operator).await?;
    mark_released(conn, biz_id, release.cfg_id, operator).await?;

    release.state = ReleaseState::Published.as_str().to_string();
    Ok(release)
}

#[derive(Clone)]
pub struct ReleaseStore {
    ctx: StoreContext,
}

impl ReleaseStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx }
    }

    /// Cut a release from a confirmed commit; strategy id 0 targets every
    /// instance.
    pub async fn create(
        &self,
        biz_id: i64,
        app_id: i64,
        commit_id: i64,
        strategy_id: i64,
        name: &str,
        memo: &str,
        operator: &str,
    ) -> BscpResult<i64> {
        let db = self.ctx.db(biz_id)?;
        let id = timed(self.ctx.timeout(), "release.create", async {
            let strategies = strategy_snapshot(db, biz_id, app_id, strategy_id).await?;
            insert_release(
                db,
                biz_id,
                app_id,
                commit_id,
                strategy_id,
                &strategies,
                name,
                memo,
                0,
                operator,
            )
            .await
        })
        .await?;

        info!(biz_id, app_id, release_id = id, commit_id, strategy_id, "Release created");
        Ok(id)
    }

    pub async fn cancel(&self, biz_id: i64, release_id: i64, operator: &str) -> BscpResult<()> {
        let db = self.ctx.db(biz_id)?;
        timed(
            self.ctx.timeout(),
            "release.cancel",
            transition(
                db,
                biz_id,
                release_id,
                &[ReleaseState::Init],
                ReleaseState::Canceled,
                operator,
            ),
        )
        .await?;

        info!(biz_id, release_id, "Release canceled");
        Ok(())
    }

    /// Publish a release atomically and return its published state.
    pub async fn publish(
        &self,
        biz_id: i64,
        release_id: i64,
        operator: &str,
    ) -> BscpResult<ReleaseInfo> {
        let db = self.ctx.db(biz_id)?;
        let release = timed(self.ctx.timeout(), "release.publish", async {
            let txn = begin(db).await?;
            let result = publish_in(&txn, biz_id, release_id, operator).await;
            finish(txn, result).await
        })
        .await?;

        metrics::counter!("bscp_release_published_total").increment(1);
        info!(biz_id, release_id, cfg_id = release.cfg_id, "Release published");
        Ok(to_release_info(release))
    }

    /// Mark a published release as rolled back.
    pub async fn rollback(
        &self,
        biz_id: i64,
        release_id: i64,
        operator: &str,
    ) -> BscpResult<ReleaseInfo> {
        let db = self.ctx.db(biz_id)?;
        let release = timed(self.ctx.timeout(), "release.rollback", async {
            transition(
                db,
                biz_id,
                release_id,
                &[ReleaseState::Published],
                ReleaseState::Rollbacked,
                operator,
            )
            .await?;
            find_release(db, biz_id, release_id).await
        })
        .await?;

        info!(biz_id, release_id, "Release rolled back");
        Ok(to_release_info(release))
    }

    /// A release that may be reloaded: it must currently be Published.
    pub async fn reload_target(&self, biz_id: i64, release_id: i64) -> BscpResult<ReleaseInfo> {
        let release = self.query(biz_id, release_id).await?;
        let state: ReleaseState = release.state.parse()?;
        if state != ReleaseState::Published {
            return Err(BscpError::illegal_transition(
                "release", release_id, state, "Reloaded",
            ));
        }
        Ok(release)
    }

    pub async fn query(&self, biz_id: i64, release_id: i64) -> BscpResult<ReleaseInfo> {
        let db = self.ctx.db(biz_id)?;
        timed(
            self.ctx.timeout(),
            "release.get",
            find_release(db, biz_id, release_id),
        )
        .await
        .map(to_release_info)
    }

    /// Published releases of a config item, newest (highest id) first.
    pub async fn query_newest(
        &self,
        biz_id: i64,
        cfg_id: i64,
        page_number: u64,
        page_size: u64,
    ) -> BscpResult<Page<ReleaseInfo>> {
        let db = self.ctx.db(biz_id)?;
        let (total, models) = timed(self.ctx.timeout(), "release.newest", async {
            let paginator = releases::Entity::find()
                .filter(releases::Column::BizId.eq(biz_id))
                .filter(releases::Column::CfgId.eq(cfg_id))
                .filter(releases::Column::State.eq(ReleaseState::Published.as_str()))
                .order_by_desc(releases::Column::Id)
                .paginate(db, page_size);

            let total = paginator.num_items().await.map_err(storage_error)?;
            let models = paginator
                .fetch_page(page_number.saturating_sub(1))
                .await
                .map_err(storage_error)?;
            Ok::<_, BscpError>((total, models))
        })
        .await?;

        Ok(Page::new(
            total,
            page_number,
            page_size,
            models.into_iter().map(to_release_info).collect(),
        ))
    }

    /// Newest published release of a config item whose strategy matches the
    /// caller's labels, with the content reference of its commit.
    pub async fn newest_matching(
        &self,
        biz_id: i64,
        app_id: i64,
        cfg_id: i64,
        labels: &HashMap<String, String>,
    ) -> BscpResult<Option<(ReleaseInfo, Option<ContentRef>)>> {
        let db = self.ctx.db(biz_id)?;
        let published = timed(self.ctx.timeout(), "release.published", async {
            releases::Entity::find()
                .filter(releases::Column::BizId.eq(biz_id))
                .filter(releases::Column::AppId.eq(app_id))
                .filter(releases::Column::CfgId.eq(cfg_id))
                .filter(releases::Column::State.eq(ReleaseState::Published.as_str()))
                .order_by_desc(releases::Column::Id)
                .all(db)
                .await
                .map_err(storage_error)
        })
        .await?;

        let matched = published.into_iter().find(|release| {
            match Predicate::parse_str(&release.strategies) {
                Ok(predicate) => predicate.matches(labels),
                Err(e) => {
                    warn!(release_id = release.id, error = %e, "Skipping release with unreadable strategy");
                    false
                }
            }
        });

        let Some(release) = matched else {
            return Ok(None);
        };

        let commit = timed(
            self.ctx.timeout(),
            "commit.get",
            find_commit(db, biz_id, release.commit_id),
        )
        .await?;

        Ok(Some((to_release_info(release), to_commit_info(commit).content)))
    }
}
