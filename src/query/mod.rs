// Query services over the persisted graph

pub mod engine;
pub mod traverse;
