//! Media pipeline: fetch inbound images, decode and scale them for the model,
//! and persist generated images in a private temp directory.

pub mod error;
pub mod fetch;
pub mod image_ops;
pub mod store;

pub use {
    error::{Error, Result},
    fetch::{HttpImageSource, ImageSource},
    image_ops::InputImage,
    store::ResultImageStore,
};
