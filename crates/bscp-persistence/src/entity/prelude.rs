pub use super::commits::Entity as Commits;
pub use super::config_items::Entity as ConfigItems;
pub use super::multi_commits::Entity as MultiCommits;
pub use super::multi_releases::Entity as MultiReleases;
pub use super::releases::Entity as Releases;
pub use super::strategies::Entity as Strategies;
