//! Domain model: catalog records, cart and order aggregates, value objects.
pub mod aggregates;
pub mod events;
pub mod value_objects;
