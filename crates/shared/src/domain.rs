use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(WorkspaceId);
id_newtype!(ExperimentId);
id_newtype!(TagId);

/// Experiment list filter. `ShowAll` is never confused with a real tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TagFilter {
    #[default]
    ShowAll,
    Tag(TagId),
}

impl TagFilter {
    /// Wire sentinel used for "no tag constraint".
    pub const SHOW_ALL_ID: i64 = -1;

    pub fn id(self) -> i64 {
        match self {
            Self::ShowAll => Self::SHOW_ALL_ID,
            Self::Tag(tag_id) => tag_id.0,
        }
    }

    pub fn from_id(id: i64) -> Self {
        if id == Self::SHOW_ALL_ID {
            Self::ShowAll
        } else {
            Self::Tag(TagId(id))
        }
    }

    pub fn tag_id(self) -> Option<TagId> {
        match self {
            Self::ShowAll => None,
            Self::Tag(tag_id) => Some(tag_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagScope {
    Experiment(ExperimentId),
    User,
}
