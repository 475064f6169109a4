#![allow(dead_code)]

pub mod components;
pub mod fixtures;

pub use components::*;
pub use fixtures::*;
