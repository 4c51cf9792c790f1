//! Subseek - Concurrent Subtitle Search
//!
//! Finds subtitles for video files by querying several remote subtitle
//! databases at once, picking the most popular match and saving it next to
//! the video.

pub mod cli;
pub mod config;
pub mod error;
pub mod hash;
pub mod language;
pub mod provider;
pub mod registry;
pub mod search;
pub mod select;
pub mod workflow;
