// tests/property_test.rs

//! Property-based tests for the tie-break rule's ordering invariant.

mod property {
    pub mod election_test;
}
