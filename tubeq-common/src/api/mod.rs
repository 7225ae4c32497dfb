//! API types shared between the player service and its clients

pub mod types;
