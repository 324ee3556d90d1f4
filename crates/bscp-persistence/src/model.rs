//! Domain model types for the persistence layer: paging and the lifecycle
//! states stored in each table's `state` column.

use serde::{Deserialize, Serialize};

use bscp_common::BscpError;

/// Generic paginated result
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total_count: u64,
    pub page_number: u64,
    pub pages_available: u64,
    pub page_items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(total_count: u64, page_number: u64, page_size: u64, page_items: Vec<T>) -> Self {
        Self {
            total_count,
            page_number,
            pages_available: if page_size > 0 {
                total_count.div_ceil(page_size)
            } else {
                0
            },
            page_items,
        }
    }

    pub fn empty() -> Self {
        Self {
            total_count: 0,
            page_number: 0,
            pages_available: 0,
            page_items: Vec::new(),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            total_count: self.total_count,
            page_number: self.page_number,
            pages_available: self.pages_available,
            page_items: self.page_items.into_iter().map(f).collect(),
        }
    }
}

/// Declares a lifecycle state enum stored as its variant name.
macro_rules! state_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = BscpError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok($name::$variant),)+
                    _ => Err(BscpError::InternalError(format!(
                        "unknown {} state '{}'",
                        stringify!($name),
                        s
                    ))),
                }
            }
        }
    };
}

state_enum!(
    /// Commit lifecycle. Moves forward only: Init to Confirmed or Canceled.
    CommitState { Init, Confirmed, Canceled }
);

state_enum!(
    /// Multi commit lifecycle, mirroring [`CommitState`].
    MultiCommitState { Init, Confirmed, Canceled }
);

state_enum!(
    /// Release lifecycle.
    ReleaseState { Init, Published, Canceled, Rollbacked }
);

state_enum!(
    /// Multi release lifecycle, mirroring [`ReleaseState`].
    MultiReleaseState { Init, Published, Canceled, Rollbacked }
);

state_enum!(
    /// Config item state; flipped to Released by the first published release.
    ConfigItemState { Init, Released }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_new() {
        let page = Page::new(101, 1, 10, vec![1, 2, 3]);
        assert_eq!(page.pages_available, 11);
        assert_eq!(page.page_items.len(), 3);

        let page: Page<i32> = Page::new(5, 1, 0, vec![]);
        assert_eq!(page.pages_available, 0);
    }

    #[test]
    fn test_page_map() {
        let page = Page::new(2, 1, 10, vec![1, 2]).map(|v| v * 10);
        assert_eq!(page.page_items, vec![10, 20]);
        assert_eq!(page.total_count, 2);
    }

    #[test]
    fn test_state_round_trip_names() {
        assert_eq!(ReleaseState::Rollbacked.as_str(), "Rollbacked");
        assert_eq!(
            "Confirmed".parse::<CommitState>().unwrap(),
            CommitState::Confirmed
        );
        assert!("Deleted".parse::<ReleaseState>().is_err());
        assert_eq!(ConfigItemState::Released.to_string(), "Released");
    }
}
