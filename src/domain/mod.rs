//! Cart domain: aggregates, value objects, events and pricing rules.
pub mod aggregates;
pub mod events;
pub mod pricing;
pub mod value_objects;
