//! Commit, release, strategy and config item tables

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ConfigItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ConfigItems::Id).big_integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(ConfigItems::BizId).big_integer().not_null())
                    .col(ColumnDef::new(ConfigItems::AppId).big_integer().not_null())
                    .col(ColumnDef::new(ConfigItems::Name).string_len(128).not_null())
                    .col(ColumnDef::new(ConfigItems::Path).string_len(1024).not_null())
                    .col(ColumnDef::new(ConfigItems::FileType).string_len(32).not_null())
                    .col(ColumnDef::new(ConfigItems::State).string_len(32).not_null())
                    .col(ColumnDef::new(ConfigItems::Memo).string_len(256).not_null())
                    .col(ColumnDef::new(ConfigItems::Creator).string_len(64).not_null())
                    .col(ColumnDef::new(ConfigItems::LastModifyBy).string_len(64).not_null())
                    .col(ColumnDef::new(ConfigItems::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(ConfigItems::UpdatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_config_items_biz_app_path_name")
                    .table(ConfigItems::Table)
                    .col(ConfigItems::BizId)
                    .col(ConfigItems::AppId)
                    .col(ConfigItems::Path)
                    .col(ConfigItems::Name)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Commits::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Commits::Id).big_integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Commits::BizId).big_integer().not_null())
                    .col(ColumnDef::new(Commits::AppId).big_integer().not_null())
                    .col(ColumnDef::new(Commits::CfgsetId).big_integer().not_null())
                    .col(ColumnDef::new(Commits::ContentId).string_len(64))
                    .col(ColumnDef::new(Commits::ContentSize).big_integer())
                    .col(ColumnDef::new(Commits::Template).text())
                    .col(ColumnDef::new(Commits::TemplateId).big_integer())
                    .col(ColumnDef::new(Commits::MultiCommitId).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Commits::ReleaseId).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Commits::State).string_len(32).not_null())
                    .col(ColumnDef::new(Commits::Memo).string_len(256).not_null())
                    .col(ColumnDef::new(Commits::Creator).string_len(64).not_null())
                    .col(ColumnDef::new(Commits::LastModifyBy).string_len(64).not_null())
                    .col(ColumnDef::new(Commits::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(Commits::UpdatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_commits_biz_multi_commit")
                    .table(Commits::Table)
                    .col(Commits::BizId)
                    .col(Commits::MultiCommitId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MultiCommits::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MultiCommits::Id).big_integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(MultiCommits::BizId).big_integer().not_null())
                    .col(ColumnDef::new(MultiCommits::AppId).big_integer().not_null())
                    .col(ColumnDef::new(MultiCommits::MultiReleaseId).big_integer().not_null().default(0))
                    .col(ColumnDef::new(MultiCommits::State).string_len(32).not_null())
                    .col(ColumnDef::new(MultiCommits::Memo).string_len(256).not_null())
                    .col(ColumnDef::new(MultiCommits::Creator).string_len(64).not_null())
                    .col(ColumnDef::new(MultiCommits::LastModifyBy).string_len(64).not_null())
                    .col(ColumnDef::new(MultiCommits::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(MultiCommits::UpdatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Strategies::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Strategies::Id).big_integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Strategies::BizId).big_integer().not_null())
                    .col(ColumnDef::new(Strategies::AppId).big_integer().not_null())
                    .col(ColumnDef::new(Strategies::Name).string_len(128).not_null())
                    .col(ColumnDef::new(Strategies::Content).text().not_null())
                    .col(ColumnDef::new(Strategies::Memo).string_len(256).not_null())
                    .col(ColumnDef::new(Strategies::Creator).string_len(64).not_null())
                    .col(ColumnDef::new(Strategies::LastModifyBy).string_len(64).not_null())
                    .col(ColumnDef::new(Strategies::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(Strategies::UpdatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_strategies_biz_app_name")
                    .table(Strategies::Table)
                    .col(Strategies::BizId)
                    .col(Strategies::AppId)
                    .col(Strategies::Name)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Releases::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Releases::Id).big_integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Releases::BizId).big_integer().not_null())
                    .col(ColumnDef::new(Releases::AppId).big_integer().not_null())
                    .col(ColumnDef::new(Releases::CfgId).big_integer().not_null())
                    .col(ColumnDef::new(Releases::CommitId).big_integer().not_null())
                    .col(ColumnDef::new(Releases::Name).string_len(128).not_null())
                    .col(ColumnDef::new(Releases::StrategyId).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Releases::Strategies).text().not_null())
                    .col(ColumnDef::new(Releases::MultiReleaseId).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Releases::State).string_len(32).not_null())
                    .col(ColumnDef::new(Releases::Memo).string_len(256).not_null())
                    .col(ColumnDef::new(Releases::Creator).string_len(64).not_null())
                    .col(ColumnDef::new(Releases::LastModifyBy).string_len(64).not_null())
                    .col(ColumnDef::new(Releases::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(Releases::UpdatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_releases_biz_cfg_name")
                    .table(Releases::Table)
                    .col(Releases::BizId)
                    .col(Releases::CfgId)
                    .col(Releases::Name)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_releases_cfg_state")
                    .table(Releases::Table)
                    .col(Releases::CfgId)
                    .col(Releases::State)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MultiReleases::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MultiReleases::Id).big_integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(MultiReleases::BizId).big_integer().not_null())
                    .col(ColumnDef::new(MultiReleases::AppId).big_integer().not_null())
                    .col(ColumnDef::new(MultiReleases::MultiCommitId).big_integer().not_null())
                    .col(ColumnDef::new(MultiReleases::StrategyId).big_integer().not_null().default(0))
                    .col(ColumnDef::new(MultiReleases::Name).string_len(128).not_null())
                    .col(ColumnDef::new(MultiReleases::State).string_len(32).not_null())
                    .col(ColumnDef::new(MultiReleases::Memo).string_len(256).not_null())
                    .col(ColumnDef::new(MultiReleases::Creator).string_len(64).not_null())
                    .col(ColumnDef::new(MultiReleases::LastModifyBy).string_len(64).not_null())
                    .col(ColumnDef::new(MultiReleases::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(MultiReleases::UpdatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MultiReleases::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Releases::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Strategies::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MultiCommits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Commits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ConfigItems::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum ConfigItems {
    Table,
    Id,
    BizId,
    AppId,
    Name,
    Path,
    FileType,
    State,
    Memo,
    Creator,
    LastModifyBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Commits {
    Table,
    Id,
    BizId,
    AppId,
    CfgsetId,
    ContentId,
    ContentSize,
    Template,
    TemplateId,
    MultiCommitId,
    ReleaseId,
    State,
    Memo,
    Creator,
    LastModifyBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MultiCommits {
    Table,
    Id,
    BizId,
    AppId,
    MultiReleaseId,
    State,
    Memo,
    Creator,
    LastModifyBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Strategies {
    Table,
    Id,
    BizId,
    AppId,
    Name,
    Content,
    Memo,
    Creator,
    LastModifyBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Releases {
    Table,
    Id,
    BizId,
    AppId,
    CfgId,
    CommitId,
    Name,
    StrategyId,
    Strategies,
    MultiReleaseId,
    State,
    Memo,
    Creator,
    LastModifyBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MultiReleases {
    Table,
    Id,
    BizId,
    AppId,
    MultiCommitId,
    StrategyId,
    Name,
    State,
    Memo,
    Creator,
    LastModifyBy,
    CreatedAt,
    UpdatedAt,
}
