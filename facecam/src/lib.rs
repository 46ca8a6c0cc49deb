//! Webcam client for a face-learning backend.

pub mod camera;
pub mod client;
pub mod command;
pub mod config;
pub mod encoder;
pub mod messages;
pub mod pacer;
pub mod palette;
pub mod roster;
pub mod session;
pub mod view;

pub use client::{connect, start};
pub use config::Config;
pub use session::{Received, Session};
