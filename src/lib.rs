pub mod aggregation;
pub mod config;
pub mod data;
pub mod energy_reader;
pub mod error;
pub mod map_draw;
pub mod projection;
pub mod state;
pub mod transform;
pub mod ui;
