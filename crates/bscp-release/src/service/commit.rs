//! Commit service layer
//!
//! A commit proposes one new version of a config item. It moves forward
//! only: Init to Confirmed (after the content blob is verified) or Init to
//! Canceled. Repeating a transition that already happened succeeds.

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    prelude::Expr,
};
use tracing::info;

use bscp_api::{CommitInfo, CommitSpec, ContentRef};
use bscp_common::{BscpError, BscpResult};
use bscp_persistence::{
    CommitState, storage_error, timed,
    entity::{commits, config_items},
};

use super::{StoreContext, blob::BlobStore, millis, now};

pub(crate) fn to_commit_info(model: commits::Model) -> CommitInfo {
    let content = model.content_id.map(|content_id| ContentRef {
        content_id,
        content_size: model.content_size.unwrap_or_default().max(0) as u64,
    });

    CommitInfo {
        id: model.id,
        biz_id: model.biz_id,
        app_id: model.app_id,
        cfgset_id: model.cfgset_id,
        content,
        template: model.template,
        template_id: model.template_id,
        multi_commit_id: model.multi_commit_id,
        release_id: model.release_id,
        state: model.state,
        memo: model.memo,
        creator: model.creator,
        last_modify_by: model.last_modify_by,
        created_at: millis(model.created_at),
        updated_at: millis(model.updated_at),
    }
}

pub(crate) async fn find_commit<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    commit_id: i64,
) -> BscpResult<commits::Model> {
    commits::Entity::find_by_id(commit_id)
        .filter(commits::Column::BizId.eq(biz_id))
        .one(conn)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| BscpError::not_found("commit", commit_id))
}

pub(crate) async fn find_children<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    multi_commit_id: i64,
) -> BscpResult<Vec<commits::Model>> {
    commits::Entity::find()
        .filter(commits::Column::BizId.eq(biz_id))
        .filter(commits::Column::MultiCommitId.eq(multi_commit_id))
        .order_by_asc(commits::Column::Id)
        .all(conn)
        .await
        .map_err(storage_error)
}

/// Insert one Init commit after checking that its config item exists.
pub(crate) async fn insert_commit<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    app_id: i64,
    multi_commit_id: i64,
    spec: &CommitSpec,
    operator: &str,
) -> BscpResult<i64> {
    config_items::Entity::find_by_id(spec.cfgset_id)
        .filter(config_items::Column::BizId.eq(biz_id))
        .filter(config_items::Column::AppId.eq(app_id))
        .one(conn)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| BscpError::not_found("config item", spec.cfgset_id))?;

    let now = now();
    let entity = commits::ActiveModel {
        biz_id: Set(biz_id),
        app_id: Set(app_id),
        cfgset_id: Set(spec.cfgset_id),
        content_id: Set(spec.content.as_ref().map(|c| c.content_id.clone())),
        content_size: Set(spec.content.as_ref().map(|c| c.content_size as i64)),
        template: Set(spec.template.clone().filter(|t| !t.is_empty())),
        template_id: Set(spec.template_id.filter(|id| *id > 0)),
        multi_commit_id: Set(multi_commit_id),
        release_id: Set(0),
        state: Set(CommitState::Init.as_str().to_string()),
        memo: Set(spec.memo.clone()),
        creator: Set(operator.to_string()),
        last_modify_by: Set(operator.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let model = entity.insert(conn).await.map_err(storage_error)?;
    Ok(model.id)
}

/// Move a commit to `to` if it is currently in one of `from`.
///
/// A commit already in `to` is left alone and reported as success.
pub(crate) async fn transition<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    commit_id: i64,
    from: &[CommitState],
    to: CommitState,
    operator: &str,
) -> BscpResult<()> {
    let result = commits::Entity::update_many()
        .col_expr(commits::Column::State, Expr::value(to.as_str()))
        .col_expr(commits::Column::LastModifyBy, Expr::value(operator))
        .col_expr(commits::Column::UpdatedAt, Expr::value(now()))
        .filter(commits::Column::Id.eq(commit_id))
        .filter(commits::Column::BizId.eq(biz_id))
        .filter(commits::Column::State.is_in(from.iter().map(|s| s.as_str())))
        .exec(conn)
        .await
        .map_err(storage_error)?;

    if result.rows_affected > 0 {
        return Ok(());
    }

    let current: CommitState = find_commit(conn, biz_id, commit_id).await?.state.parse()?;
    if current == to {
        return Ok(());
    }
    Err(BscpError::illegal_transition("commit", commit_id, current, to))
}

/// Stamp the publishing release on its source commit; the commit must be
/// Confirmed.
pub(crate) async fn stamp_release<C: ConnectionTrait>(
    conn: &C,
    biz_id: i64,
    commit_id: i64,
    release_id: i64,
    operator: &str,
) -> BscpResult<()> {
    let result = commits::Entity::update_many()
        .col_expr(commits::Column::ReleaseId, Expr::value(release_id))
        .col_expr(commits::Column::LastModifyBy, Expr::value(operator))
        .col_expr(commits::Column::UpdatedAt, Expr::value(now()))
        .filter(commits::Column::Id.eq(commit_id))
        .filter(commits::Column::BizId.eq(biz_id))
        .filter(commits::Column::State.eq(CommitState::Confirmed.as_str()))
        .exec(conn)
        .await
        .map_err(storage_error)?;

    if result.rows_affected > 0 {
        return Ok(());
    }

    let current: CommitState = find_commit(conn, biz_id, commit_id).await?.state.parse()?;
    if current == CommitState::Confirmed {
        return Ok(());
    }
    Err(BscpError::illegal_transition(
        "commit", commit_id, current, "Released",
    ))
}

#[derive(Clone)]
pub struct CommitStore {
    ctx: StoreContext,
    blobs: Arc<dyn BlobStore>,
}

impl CommitStore {
    pub fn new(ctx: StoreContext, blobs: Arc<dyn BlobStore>) -> Self {
        Self { ctx, blobs }
    }

    pub async fn create(
        &self,
        biz_id: i64,
        app_id: i64,
        spec: &CommitSpec,
        operator: &str,
    ) -> BscpResult<i64> {
        let db = self.ctx.db(biz_id)?;
        let id = timed(
            self.ctx.timeout(),
            "commit.create",
            insert_commit(db, biz_id, app_id, 0, spec, operator),
        )
        .await?;

        info!(biz_id, app_id, commit_id = id, cfgset_id = spec.cfgset_id, "Commit created");
        Ok(id)
    }

    /// Confirm a commit after verifying its content blob was uploaded.
    pub async fn confirm(&self, biz_id: i64, commit_id: i64, operator: &str) -> BscpResult<()> {
        let db = self.ctx.db(biz_id)?;
        let commit = timed(
            self.ctx.timeout(),
            "commit.get",
            find_commit(db, biz_id, commit_id),
        )
        .await?;

        match commit.state.parse::<CommitState>()? {
            CommitState::Confirmed => return Ok(()),
            CommitState::Canceled => {
                return Err(BscpError::illegal_transition(
                    "commit",
                    commit_id,
                    CommitState::Canceled,
                    CommitState::Confirmed,
                ));
            }
            CommitState::Init => {}
        }

        if let Some(content) = to_commit_info(commit).content
            && !self.blobs.exists(biz_id, &content).await?
        {
            return Err(BscpError::InvalidInput(format!(
                "content {} with size {} has not been uploaded",
                content.content_id, content.content_size
            )));
        }

        timed(
            self.ctx.timeout(),
            "commit.confirm",
            transition(
                db,
                biz_id,
                commit_id,
                &[CommitState::Init],
                CommitState::Confirmed,
                operator,
            ),
        )
        .await?;

        metrics::counter!("bscp_commit_confirmed_total").increment(1);
        info!(biz_id, commit_id, "Commit confirmed");
        Ok(())
    }

    pub async fn cancel(&self, biz_id: i64, commit_id: i64, operator: &str) -> BscpResult<()> {
        let db = self.ctx.db(biz_id)?;
        timed(
            self.ctx.timeout(),
            "commit.cancel",
            transition(
                db,
                biz_id,
                commit_id,
                &[CommitState::Init],
                CommitState::Canceled,
                operator,
            ),
        )
        .await?;

        info!(biz_id, commit_id, "Commit canceled");
        Ok(())
    }

    pub async fn query(&self, biz_id: i64, commit_id: i64) -> BscpResult<CommitInfo> {
        let db = self.ctx.db(biz_id)?;
        timed(
            self.ctx.timeout(),
            "commit.get",
            find_commit(db, biz_id, commit_id),
        )
        .await
        .map(to_commit_info)
    }
}
