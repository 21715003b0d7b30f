//! Folder search criteria

/// Which messages a folder search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFilter {
    /// Every message in the folder.
    All,
    /// Messages lacking `\Seen`.
    Unseen,
}

impl SearchFilter {
    /// The IMAP SEARCH criteria for this filter.
    #[must_use]
    pub const fn to_imap_query(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Unseen => "UNSEEN",
        }
    }
}
