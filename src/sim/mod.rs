pub mod actions;
pub mod analysis;
pub mod config;
pub mod detector;
pub mod efficiency;
pub mod event;
pub mod field;
pub mod framework;
pub mod hits;
pub mod materials;
pub mod primary;
pub mod sensitive;
pub mod transport;
