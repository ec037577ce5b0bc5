//! Test suites for the indicator server bootstrap and launch sequence.

pub(crate) mod support;
