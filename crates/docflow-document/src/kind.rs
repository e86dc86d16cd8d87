use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DocumentError;

/// Discriminator of the concrete [`Document`](crate::Document) variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Text,
    Xml,
    Html,
    Tabular,
    Passage,
    Collection,
    Resource,
    Form,
}

impl DocumentKind {
    pub const ALL: [Self; 8] = [
        Self::Text,
        Self::Xml,
        Self::Html,
        Self::Tabular,
        Self::Passage,
        Self::Collection,
        Self::Resource,
        Self::Form,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Xml => "xml",
            Self::Html => "html",
            Self::Tabular => "tabular",
            Self::Passage => "passage",
            Self::Collection => "collection",
            Self::Resource => "resource",
            Self::Form => "form",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DocumentError::UnknownKind(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrip() {
        for kind in DocumentKind::ALL {
            assert_eq!(kind.as_str().parse::<DocumentKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_rejected() {
        let err = "spreadsheet".parse::<DocumentKind>().unwrap_err();
        assert!(err.to_string().contains("spreadsheet"));
    }

    #[test]
    fn serde_matches_as_str() {
        let json = serde_json::to_string(&DocumentKind::Collection).unwrap();
        assert_eq!(json, "\"collection\"");
    }
}
