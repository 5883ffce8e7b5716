use core::fmt;
use std::sync::LazyLock;

use regex::Regex;

static NUMERIC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+$").expect("valid numeric id regex"));

static HANDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{5,}$").expect("valid handle regex"));

/// A channel as typed by a user: either a numeric chat id or a public `@handle`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelRef {
    Id(i64),
    /// Always stored with its leading `@`.
    Handle(String),
}

impl ChannelRef {
    /// Parse free text into a channel reference.
    ///
    /// Purely numeric input (optionally negative) becomes [`ChannelRef::Id`].
    /// Anything else must be a handle of at least five `[A-Za-z0-9_]` characters,
    /// with or without a leading `@`. Returns `None` for everything else,
    /// including numbers that overflow an `i64`.
    #[must_use]
    pub fn normalize(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        if NUMERIC_ID.is_match(trimmed) {
            return trimmed.parse().ok().map(Self::Id);
        }
        let bare = trimmed.strip_prefix('@').unwrap_or(trimmed);
        HANDLE
            .is_match(bare)
            .then(|| Self::Handle(format!("@{bare}")))
    }

    #[must_use]
    pub const fn as_id(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Handle(_) => None,
        }
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Handle(handle) => f.write_str(handle),
        }
    }
}
