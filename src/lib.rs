// This is free and unencumbered software released into the public domain.

//! Photobooth camera adapter.
//!
//! [`shared::CameraAdapter`] drives a [`shared::CameraDevice`] through the
//! preview / countdown / capture cycle a photobooth host expects, rendering
//! the live view and a transient overlay onto a [`shared::Display`].

pub mod cli;
pub mod shared;
