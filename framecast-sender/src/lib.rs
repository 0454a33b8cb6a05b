//! # framecast-sender
//!
//! Produces raw frames from a built-in source (test pattern or a file of
//! pre-decoded RGB24 frames), fragments them into chunk datagrams and
//! streams them to whichever receiver last sent a control sample.

pub mod config;
