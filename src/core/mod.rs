//! Core viewer systems: camera, input, timing, errors

pub mod camera;
pub mod camera_controller;
pub mod error;
pub mod input;
pub mod logging;
pub mod time;
pub mod types;
