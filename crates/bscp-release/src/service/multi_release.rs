//! Multi release service layer
//!
//! A multi release cuts one release per confirmed child of a multi commit
//! and publishes or cancels them together.

#![allow(clippy::too_many_arguments)]

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, prelude::Expr,
};
use tracing::{info, warn};

use bscp_api::{ItemResult, MultiReleaseInfo, ReleaseInfo};
use bscp_common::{BscpError, BscpResult};
use bscp_persistence::{
    CommitState, MultiCommitState, MultiReleaseState, ReleaseState,
    entity::{multi_releases, releases},
    storage_error, timed,
};

use super::{
    StoreContext, begin,
    commit::find_children,
    finish, millis,
    multi_commit::{find_multi_commit, stamp_multi_release},
    now,
    release::{find_members, insert_release, publish_in, to_release_info},
    strategy::strategy_snapshot,
};

async fn find_multi_release<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    multi_release_id: i64,
) -> BscpResult<multi_releases::Model> {
    multi_releases::Entity::find_by_id(multi_release_id)
        .filter(multi_releases::Column::BizId.eq(biz_id))
        .one(conn)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| BscpError::not_found("multi release", multi_release_id))
}

async fn transition<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    multi_release_id: i64,
    from: &[MultiReleaseState],
    to: MultiReleaseState,
    operator: &str,
) -> BscpResult<()> {
    let result = multi_releases::Entity::update_many()
        .col_expr(multi_releases::Column::State, Expr::value(to.as_str()))
        .col_expr(multi_releases::Column::LastModifyBy, Expr::value(operator))
        .col_expr(multi_releases::Column::UpdatedAt, Expr::value(now()))
        .filter(multi_releases::Column::Id.eq(multi_release_id))
        .filter(multi_releases::Column::BizId.eq(biz_id))
        .filter(multi_releases::Column::State.is_in(from.iter().map(|s| s.as_str())))
        .exec(conn)
        .await
        .map_err(storage_error)?;

    if result.rows_affected > 0 {
        return Ok(());
    }

    let current: MultiReleaseState = find_multi_release(conn, biz_id, multi_release_id)
        .await?
        .state
        .parse()?;
    if current == to {
        return Ok(());
    }
    Err(BscpError::illegal_transition(
        "multi release",
        multi_release_id,
        current,
        to,
    ))
}

#[derive(Clone)]
pub struct MultiReleaseStore {
    ctx: StoreContext,
}

impl MultiReleaseStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx }
    }

    /// Cut one release per child of a confirmed multi commit.
    ///
    /// Children that are not Confirmed, or whose release cannot be created,
    /// are reported as failed items.
    pub async fn create(
        &self,
        biz_id: i64,
        app_id: i64,
        multi_commit_id: i64,
        strategy_id: i64,
        name: &str,
        memo: &str,
        operator: &str,
    ) -> BscpResult<(i64, Vec<ItemResult>)> {
        let db = self.ctx.db(biz_id)?;
        let (strategies, children) = timed(self.ctx.timeout(), "multi_release.prepare", async {
            let parent = find_multi_commit(db, biz_id, multi_commit_id).await?;
            if parent.app_id != app_id {
                return Err(BscpError::InvalidInput(format!(
                    "multi commit {} does not belong to app {}",
                    multi_commit_id, app_id
                )));
            }
            let state: MultiCommitState = parent.state.parse()?;
            if state != MultiCommitState::Confirmed {
                return Err(BscpError::illegal_transition(
                    "multi commit",
                    multi_commit_id,
                    state,
                    "Released",
                ));
            }

            let strategies = strategy_snapshot(db, biz_id, app_id, strategy_id).await?;
            let children = find_children(db, biz_id, multi_commit_id).await?;
            Ok::<_, BscpError>((strategies, children))
        })
        .await?;

        let now = now();
        let entity = multi_releases::ActiveModel {
            biz_id: Set(biz_id),
            app_id: Set(app_id),
            multi_commit_id: Set(multi_commit_id),
            strategy_id: Set(strategy_id),
            name: Set(name.to_string()),
            state: Set(MultiReleaseState::Init.as_str().to_string()),
            memo: Set(memo.to_string()),
            creator: Set(operator.to_string()),
            last_modify_by: Set(operator.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let multi_release_id = timed(self.ctx.timeout(), "multi_release.create", async {
            entity.insert(db).await.map_err(storage_error)
        })
        .await?
        .id;

        let mut results = Vec::with_capacity(children.len());
        for child in children {
            let state = child.state.parse::<CommitState>();
            let outcome = match state {
                Ok(CommitState::Confirmed) => {
                    timed(
                        self.ctx.timeout(),
                        "release.create",
                        insert_release(
                            db,
                            biz_id,
                            app_id,
                            child.id,
                            strategy_id,
                            &strategies,
                            name,
                            memo,
                            multi_release_id,
                            operator,
                        ),
                    )
                    .await
                }
                Ok(other) => Err(BscpError::illegal_transition(
                    "commit", child.id, other, "Released",
                )),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(release_id) => results.push(ItemResult::ok(child.cfgset_id, release_id)),
                Err(e) => {
                    warn!(biz_id, multi_release_id, commit_id = child.id, error = %e, "Failed to create member release");
                    results.push(ItemResult::failed(child.cfgset_id, 0, &e));
                }
            }
        }

        timed(
            self.ctx.timeout(),
            "multi_commit.stamp",
            stamp_multi_release(db, biz_id, multi_commit_id, multi_release_id, operator),
        )
        .await?;

        info!(
            biz_id,
            multi_release_id,
            multi_commit_id,
            members = results.iter().filter(|r| r.success).count(),
            "Multi release created"
        );
        Ok((multi_release_id, results))
    }

    /// Publish every non-canceled member in one transaction.
    pub async fn publish(
        &self,
        biz_id: i64,
        multi_release_id: i64,
        operator: &str,
    ) -> BscpResult<Vec<ReleaseInfo>> {
        let db = self.ctx.db(biz_id)?;
        let published = timed(self.ctx.timeout(), "multi_release.publish", async {
            let txn = begin(db).await?;
            let result = async {
                transition(
                    &txn,
                    biz_id,
                    multi_release_id,
                    &[MultiReleaseState::Init],
                    MultiReleaseState::Published,
                    operator,
                )
                .await?;

                let mut published = Vec::new();
                for member in find_members(&txn, biz_id, multi_release_id).await? {
                    if member.state == ReleaseState::Canceled.as_str() {
                        continue;
                    }
                    published.push(publish_in(&txn, biz_id, member.id, operator).await?);
                }
                Ok::<_, BscpError>(published)
            }
            .await;
            finish(txn, result).await
        })
        .await?;

        metrics::counter!("bscp_release_published_total").increment(published.len() as u64);
        info!(biz_id, multi_release_id, members = published.len(), "Multi release published");
        Ok(published.into_iter().map(to_release_info).collect())
    }

    /// Cancel the multi release and its members that are still Init.
    pub async fn cancel(
        &self,
        biz_id: i64,
        multi_release_id: i64,
        operator: &str,
    ) -> BscpResult<()> {
        let db = self.ctx.db(biz_id)?;
        timed(self.ctx.timeout(), "multi_release.cancel", async {
            let txn = begin(db).await?;
            let result = async {
                transition(
                    &txn,
                    biz_id,
                    multi_release_id,
                    &[MultiReleaseState::Init],
                    MultiReleaseState::Canceled,
                    operator,
                )
                .await?;

                releases::Entity::update_many()
                    .col_expr(
                        releases::Column::State,
                        Expr::value(ReleaseState::Canceled.as_str()),
                    )
                    .col_expr(releases::Column::LastModifyBy, Expr::value(operator))
                    .col_expr(releases::Column::UpdatedAt, Expr::value(now()))
                    .filter(releases::Column::BizId.eq(biz_id))
                    .filter(releases::Column::MultiReleaseId.eq(multi_release_id))
                    .filter(releases::Column::State.eq(ReleaseState::Init.as_str()))
                    .exec(&txn)
                    .await
                    .map_err(storage_error)?;
                Ok::<_, BscpError>(())
            }
            .await;
            finish(txn, result).await
        })
        .await?;

        info!(biz_id, multi_release_id, "Multi release canceled");
        Ok(())
    }

    pub async fn query(&self, biz_id: i64, multi_release_id: i64) -> BscpResult<MultiReleaseInfo> {
        let db = self.ctx.db(biz_id)?;
        let (parent, members) = timed(self.ctx.timeout(), "multi_release.get", async {
            let parent = find_multi_release(db, biz_id, multi_release_id).await?;
            let members = find_members(db, biz_id, multi_release_id).await?;
            Ok::<_, BscpError>((parent, members))
        })
        .await?;

        Ok(MultiReleaseInfo {
            id: parent.id,
            biz_id: parent.biz_id,
            app_id: parent.app_id,
            multi_commit_id: parent.multi_commit_id,
            strategy_id: parent.strategy_id,
            name: parent.name,
            state: parent.state,
            memo: parent.memo,
            releases: members.into_iter().map(to_release_info).collect(),
            creator: parent.creator,
            last_modify_by: parent.last_modify_by,
            created_at: millis(parent.created_at),
            updated_at: millis(parent.updated_at),
        })
    }
}
