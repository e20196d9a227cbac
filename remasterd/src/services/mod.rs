//! Services for remasterd

pub mod hasher;
pub mod pipeline;
pub mod scheduler;
pub mod segmenter;
pub mod tagger;
