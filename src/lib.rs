#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod app;
pub mod cli;
pub mod controller;
pub mod error;
pub mod gpu;
pub mod image_data;
pub mod ops;
pub mod settings;
pub mod source;

pub use controller::{DisplayController, DisplayMode, RunStats};
pub use error::{EnhanceError, FatalDeviceError};
pub use image_data::{ColorSpace, Image, PixelBuffer, PixelFormat};
