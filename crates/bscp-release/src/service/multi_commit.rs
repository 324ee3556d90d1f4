//! Multi commit service layer
//!
//! A multi commit groups the commits of several config items that are meant
//! to be released together. Child operations are best-effort: one failing
//! child is recorded in the per-item results and never aborts the others.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, prelude::Expr,
};
use tracing::{info, warn};

use bscp_api::{CommitSpec, ItemResult, MultiCommitInfo, validation::validate_commit_spec};
use bscp_common::{BscpError, BscpResult};
use bscp_persistence::{MultiCommitState, entity::multi_commits, storage_error, timed};

use super::{
    StoreContext,
    commit::{CommitStore, find_children, insert_commit, to_commit_info},
    millis, now,
};

pub(crate) async fn find_multi_commit<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    multi_commit_id: i64,
) -> BscpResult<multi_commits::Model> {
    multi_commits::Entity::find_by_id(multi_commit_id)
        .filter(multi_commits::Column::BizId.eq(biz_id))
        .one(conn)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| BscpError::not_found("multi commit", multi_commit_id))
}

async fn transition<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    multi_commit_id: i64,
    from: &[MultiCommitState],
    to: MultiCommitState,
    operator: &str,
) -> BscpResult<()> {
    let result = multi_commits::Entity::update_many()
        .col_expr(multi_commits::Column::State, Expr::value(to.as_str()))
        .col_expr(multi_commits::Column::LastModifyBy, Expr::value(operator))
        .col_expr(multi_commits::Column::UpdatedAt, Expr::value(now()))
        .filter(multi_commits::Column::Id.eq(multi_commit_id))
        .filter(multi_commits::Column::BizId.eq(biz_id))
        .filter(multi_commits::Column::State.is_in(from.iter().map(|s| s.as_str())))
        .exec(conn)
        .await
        .map_err(storage_error)?;

    if result.rows_affected > 0 {
        return Ok(());
    }

    let current: MultiCommitState = find_multi_commit(conn, biz_id, multi_commit_id)
        .await?
        .state
        .parse()?;
    if current == to {
        return Ok(());
    }
    Err(BscpError::illegal_transition(
        "multi commit",
        multi_commit_id,
        current,
        to,
    ))
}

/// Record which multi release was cut from a multi commit.
pub(crate) async fn stamp_multi_release<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    multi_commit_id: i64,
    multi_release_id: i64,
    operator: &str,
) -> BscpResult<()> {
    multi_commits::Entity::update_many()
        .col_expr(
            multi_commits::Column::MultiReleaseId,
            Expr::value(multi_release_id),
        )
        .col_expr(multi_commits::Column::LastModifyBy, Expr::value(operator))
        .col_expr(multi_commits::Column::UpdatedAt, Expr::value(now()))
        .filter(multi_commits::Column::Id.eq(multi_commit_id))
        .filter(multi_commits::Column::BizId.eq(biz_id))
        .exec(conn)
        .await
        .map_err(storage_error)?;
    Ok(())
}

#[derive(Clone)]
pub struct MultiCommitStore {
    ctx: StoreContext,
    commits: CommitStore,
}

impl MultiCommitStore {
    pub fn new(ctx: StoreContext, commits: CommitStore) -> Self {
        Self { ctx, commits }
    }

    /// Create (or append to an Init) multi commit, then create every child.
    ///
    /// Returns the parent id and one result per submitted item, in order.
    pub async fn create(
        &self,
        biz_id: i64,
        app_id: i64,
        reuse_commit_id: i64,
        memo: &str,
        items: &[CommitSpec],
        operator: &str,
    ) -> BscpResult<(i64, Vec<ItemResult>)> {
        let db = self.ctx.db(biz_id)?;

        let multi_commit_id = if reuse_commit_id > 0 {
            let parent = timed(
                self.ctx.timeout(),
                "multi_commit.get",
                find_multi_commit(db, biz_id, reuse_commit_id),
            )
            .await?;

            let state: MultiCommitState = parent.state.parse()?;
            if state != MultiCommitState::Init {
                return Err(BscpError::illegal_transition(
                    "multi commit",
                    reuse_commit_id,
                    state,
                    MultiCommitState::Init,
                ));
            }
            if parent.app_id != app_id {
                return Err(BscpError::InvalidInput(format!(
                    "multi commit {} does not belong to app {}",
                    reuse_commit_id, app_id
                )));
            }
            reuse_commit_id
        } else {
            let now = now();
            let entity = multi_commits::ActiveModel {
                biz_id: Set(biz_id),
                app_id: Set(app_id),
                multi_release_id: Set(0),
                state: Set(MultiCommitState::Init.as_str().to_string()),
                memo: Set(memo.to_string()),
                creator: Set(operator.to_string()),
                last_modify_by: Set(operator.to_string()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };
            timed(self.ctx.timeout(), "multi_commit.create", async {
                entity.insert(db).await.map_err(storage_error)
            })
            .await?
            .id
        };

        let mut results = Vec::with_capacity(items.len());
        for spec in items {
            let outcome = match validate_commit_spec(spec) {
                Ok(()) => {
                    timed(
                        self.ctx.timeout(),
                        "commit.create",
                        insert_commit(db, biz_id, app_id, multi_commit_id, spec, operator),
                    )
                    .await
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(commit_id) => results.push(ItemResult::ok(spec.cfgset_id, commit_id)),
                Err(e) => {
                    warn!(
                        biz_id,
                        multi_commit_id,
                        cfgset_id = spec.cfgset_id,
                        error = %e,
                        "Failed to create child commit"
                    );
                    results.push(ItemResult::failed(spec.cfgset_id, 0, &e));
                }
            }
        }

        info!(
            biz_id,
            multi_commit_id,
            items = items.len(),
            failed = results.iter().filter(|r| !r.success).count(),
            "Multi commit created"
        );
        Ok((multi_commit_id, results))
    }

    /// Confirm the parent, then confirm every child best-effort.
    pub async fn confirm(
        &self,
        biz_id: i64,
        multi_commit_id: i64,
        operator: &str,
    ) -> BscpResult<Vec<ItemResult>> {
        let db = self.ctx.db(biz_id)?;
        timed(
            self.ctx.timeout(),
            "multi_commit.confirm",
            transition(
                db,
                biz_id,
                multi_commit_id,
                &[MultiCommitState::Init],
                MultiCommitState::Confirmed,
                operator,
            ),
        )
        .await?;

        let children = timed(
            self.ctx.timeout(),
            "commit.list",
            find_children(db, biz_id, multi_commit_id),
        )
        .await?;

        let mut results = Vec::with_capacity(children.len());
        for child in children {
            match self.commits.confirm(biz_id, child.id, operator).await {
                Ok(()) => results.push(ItemResult::ok(child.cfgset_id, child.id)),
                Err(e) => {
                    warn!(biz_id, multi_commit_id, commit_id = child.id, error = %e, "Failed to confirm child commit");
                    results.push(ItemResult::failed(child.cfgset_id, child.id, &e));
                }
            }
        }

        info!(biz_id, multi_commit_id, "Multi commit confirmed");
        Ok(results)
    }

    /// Cancel the parent, then cancel every child best-effort.
    ///
    /// The child list is read before the parent changes state, so children
    /// are visited even when the parent was already canceled.
    pub async fn cancel(
        &self,
        biz_id: i64,
        multi_commit_id: i64,
        operator: &str,
    ) -> BscpResult<Vec<ItemResult>> {
        let db = self.ctx.db(biz_id)?;
        let children = timed(
            self.ctx.timeout(),
            "commit.list",
            find_children(db, biz_id, multi_commit_id),
        )
        .await?;

        timed(
            self.ctx.timeout(),
            "multi_commit.cancel",
            transition(
                db,
                biz_id,
                multi_commit_id,
                &[MultiCommitState::Init],
                MultiCommitState::Canceled,
                operator,
            ),
        )
        .await?;

        let mut results = Vec::with_capacity(children.len());
        for child in children {
            match self.commits.cancel(biz_id, child.id, operator).await {
                Ok(()) => results.push(ItemResult::ok(child.cfgset_id, child.id)),
                Err(e) => {
                    warn!(biz_id, multi_commit_id, commit_id = child.id, error = %e, "Failed to cancel child commit");
                    results.push(ItemResult::failed(child.cfgset_id, child.id, &e));
                }
            }
        }

        info!(biz_id, multi_commit_id, "Multi commit canceled");
        Ok(results)
    }

    pub async fn query(&self, biz_id: i64, multi_commit_id: i64) -> BscpResult<MultiCommitInfo> {
        let db = self.ctx.db(biz_id)?;
        let (parent, children) = timed(self.ctx.timeout(), "multi_commit.get", async {
            let parent = find_multi_commit(db, biz_id, multi_commit_id).await?;
            let children = find_children(db, biz_id, multi_commit_id).await?;
            Ok::<_, BscpError>((parent, children))
        })
        .await?;

        Ok(MultiCommitInfo {
            id: parent.id,
            biz_id: parent.biz_id,
            app_id: parent.app_id,
            multi_release_id: parent.multi_release_id,
            state: parent.state,
            memo: parent.memo,
            commits: children.into_iter().map(to_commit_info).collect(),
            creator: parent.creator,
            last_modify_by: parent.last_modify_by,
            created_at: millis(parent.created_at),
            updated_at: millis(parent.updated_at),
        })
    }
}
