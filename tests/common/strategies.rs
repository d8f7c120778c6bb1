#![allow(dead_code)]

use proptest::prelude::*;
use std::collections::BTreeSet;

/// Three-digit division codes
pub fn division_code_strategy() -> impl Strategy<Value = String> {
    "[0-9]{3}"
}

/// Chapters as the trigger sends them, e.g. `7`, `11`, `13`
pub fn chapter_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just("7".to_string()), Just("11".to_string()), Just("13".to_string()), "[0-9]{2}"]
}

pub fn division_codes_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(division_code_strategy(), 1..8)
}

pub fn chapters_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(chapter_strategy(), 1..5)
}

/// Raw source case numbers of varying width
pub fn raw_case_number_strategy() -> impl Strategy<Value = String> {
    "[1-9][0-9]{0,9}"
}
