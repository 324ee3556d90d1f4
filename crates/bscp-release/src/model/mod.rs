pub mod strategy;

pub use strategy::{Clause, LabelMatcher, Predicate};
