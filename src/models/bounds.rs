//! # Migration Bounds
//!
//! The search space a run covers and the atomic units it is partitioned into.

use crate::error::MigrationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Division codes and chapters a run should migrate. Immutable once submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub division_codes: BTreeSet<String>,
    pub chapters: BTreeSet<String>,
}

impl Bounds {
    pub fn new<D, C, S>(division_codes: D, chapters: C) -> Self
    where
        D: IntoIterator<Item = S>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            division_codes: division_codes.into_iter().map(Into::into).collect(),
            chapters: chapters.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of atomic predicates these bounds expand to, before validation
    pub fn predicate_count(&self) -> usize {
        self.division_codes.len() * self.chapters.len()
    }
}

/// One division code and one chapter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Predicate {
    pub division_code: String,
    pub chapter: String,
}

impl Predicate {
    pub fn new(division_code: impl Into<String>, chapter: impl Into<String>) -> Self {
        Self {
            division_code: division_code.into(),
            chapter: chapter.into(),
        }
    }

    pub fn page(&self, page_number: u32) -> Result<PredicateAndPage, MigrationError> {
        PredicateAndPage::new(self.clone(), page_number)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.division_code, self.chapter)
    }
}

/// A predicate plus a 1-indexed page number
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "PredicateAndPageRepr")]
pub struct PredicateAndPage {
    #[serde(flatten)]
    predicate: Predicate,
    page_number: u32,
}

impl PredicateAndPage {
    pub fn new(predicate: Predicate, page_number: u32) -> Result<Self, MigrationError> {
        if page_number == 0 {
            return Err(MigrationError::InvalidInput(format!(
                "page numbers start at 1 (predicate {predicate})"
            )));
        }
        Ok(Self {
            predicate,
            page_number,
        })
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Zero-based offset of the first record on this page
    pub fn offset(&self, page_size: u32) -> usize {
        (self.page_number as usize - 1) * page_size as usize
    }
}

impl fmt::Display for PredicateAndPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.predicate, self.page_number)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredicateAndPageRepr {
    #[serde(flatten)]
    predicate: Predicate,
    page_number: u32,
}

impl TryFrom<PredicateAndPageRepr> for PredicateAndPage {
    type Error = MigrationError;

    fn try_from(repr: PredicateAndPageRepr) -> Result<Self, Self::Error> {
        PredicateAndPage::new(repr.predicate, repr.page_number)
    }
}
