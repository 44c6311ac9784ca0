//! wallglow: a per-output GPU wallpaper engine.
//!
//! Static images, animated fragment shaders and timed transitions between
//! wallpapers, rendered onto one surface per attached display through a
//! single shared OpenGL context. The binary in `main.rs` owns the event
//! loop and the watcher thread; everything under here is the engine.

pub mod config;
pub mod defaults;
pub mod error;
pub mod glstate;
pub mod images;
pub mod logging;
pub mod output;
pub mod persist;
pub mod reload;
pub mod renderer;
pub mod shaders;
pub mod surface;
pub mod textures;
pub mod transitions;
pub mod validate;
pub mod watch;
