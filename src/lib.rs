//! Manage device-tree overlays through the Linux kernel configfs interface
//!
//! # Implementation details
//!
//! The kernel exposes overlay lifecycle as a directory protocol under a
//! configuration filesystem root: one directory per overlay slot, holding a
//! `dtbo` blob file and a text `status` file. This crate is a thin, strictly
//! sequential controller over that protocol; all state lives in the kernel.
//!
//! Overlay content is never parsed or validated here. Compiling source
//! overlays to blobs is delegated to `dtc`.
#![doc(html_root_url = "https://docs.rs/dtovl/0.1.0")]

pub mod action;
pub mod cli;
pub mod error;
pub mod overlay;

mod util;
