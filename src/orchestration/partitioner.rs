//! # Bounds Partitioner
//!
//! Expands run bounds into the atomic predicates the root fans out over.

use crate::constants::system::CHILD_ID_SEPARATOR;
use crate::error::{MigrationError, Result};
use crate::models::{Bounds, Predicate};
use std::collections::BTreeSet;

/// Every `(divisionCode, chapter)` pair exactly once.
///
/// Chapters form the outer loop and division codes the inner one, both ascending, so the
/// same bounds always produce the same sequence. Values are trimmed; an empty set, a
/// blank value or a value containing the child-id separator is `InvalidBounds`.
pub fn flatten(bounds: &Bounds) -> Result<Vec<Predicate>> {
    let division_codes = normalized("divisionCodes", &bounds.division_codes)?;
    let chapters = normalized("chapters", &bounds.chapters)?;

    Ok(chapters
        .iter()
        .flat_map(|chapter| {
            division_codes
                .iter()
                .map(move |division_code| Predicate::new(division_code.clone(), chapter.clone()))
        })
        .collect())
}

fn normalized(field: &str, values: &BTreeSet<String>) -> Result<BTreeSet<String>> {
    if values.is_empty() {
        return Err(MigrationError::InvalidBounds(format!("{field} is empty")));
    }

    let mut trimmed = BTreeSet::new();
    for value in values {
        let value = value.trim();
        if value.is_empty() {
            return Err(MigrationError::InvalidBounds(format!(
                "{field} contains a blank value"
            )));
        }
        // Values become segments of `{parent}:{division}:{chapter}`
        if value.contains(CHILD_ID_SEPARATOR) {
            return Err(MigrationError::InvalidBounds(format!(
                "{field} value '{value}' contains '{CHILD_ID_SEPARATOR}'"
            )));
        }
        trimmed.insert(value.to_string());
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fixture_order() {
        let bounds = Bounds::new(["000", "111"], ["11", "15"]);
        let predicates = flatten(&bounds).unwrap();

        assert_eq!(
            predicates,
            vec![
                Predicate::new("000", "11"),
                Predicate::new("111", "11"),
                Predicate::new("000", "15"),
                Predicate::new("111", "15"),
            ]
        );
    }

    #[test]
    fn test_empty_and_blank_bounds_are_rejected() {
        let empty = Bounds::new(Vec::<String>::new(), vec!["11".to_string()]);
        assert!(matches!(flatten(&empty), Err(MigrationError::InvalidBounds(_))));

        let blank = Bounds::new(["000", "  "], ["11"]);
        assert!(matches!(flatten(&blank), Err(MigrationError::InvalidBounds(_))));
    }

    #[test]
    fn test_values_containing_the_separator_are_rejected() {
        let division = Bounds::new(["0", "0:1"], ["11"]);
        assert!(matches!(flatten(&division), Err(MigrationError::InvalidBounds(_))));

        let chapter = Bounds::new(["0"], ["11", "1:11"]);
        match flatten(&chapter) {
            Err(MigrationError::InvalidBounds(reason)) => assert!(reason.contains("chapters")),
            other => panic!("expected InvalidBounds, got {other:?}"),
        }
    }

    #[test]
    fn test_values_are_trimmed() {
        let bounds = Bounds::new([" 081 "], ["11", " 11"]);
        assert_eq!(flatten(&bounds).unwrap(), vec![Predicate::new("081", "11")]);
    }

    proptest! {
        #[test]
        fn prop_cartesian_product_without_duplicates(
            divisions in prop::collection::btree_set("[0-9]{3}", 1..6),
            chapters in prop::collection::btree_set("[0-9]{1,2}", 1..5),
        ) {
            let bounds = Bounds::new(divisions.clone(), chapters.clone());
            let predicates = flatten(&bounds).unwrap();

            prop_assert_eq!(predicates.len(), divisions.len() * chapters.len());
            let distinct: BTreeSet<_> = predicates.iter().cloned().collect();
            prop_assert_eq!(distinct.len(), predicates.len());
            for predicate in &predicates {
                prop_assert!(divisions.contains(&predicate.division_code));
                prop_assert!(chapters.contains(&predicate.chapter));
            }
            prop_assert_eq!(flatten(&bounds).unwrap(), predicates);
        }
    }
}
