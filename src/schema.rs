//! Entity mapping descriptors supplied per entity type at configuration time.
mod entity_mapping;

pub use entity_mapping::EntityMapping;
