//! # framecast-receiver
//!
//! Binds the video port, reassembles chunk datagrams into frames and
//! hands each completed frame to a display. Control samples from a
//! local input provider go back to the sender at a fixed rate; the first
//! one is what makes the sender start streaming.

pub mod config;
pub mod display;
pub mod input;
