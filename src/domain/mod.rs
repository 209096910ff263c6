//! Domain layer: entities, value objects, ports and the subscription registry.

pub mod entities;
pub mod errors;
pub mod events;
pub mod ports;
pub mod services;
pub mod value_objects;
