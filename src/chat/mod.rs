// src/chat/mod.rs

mod buffer;
mod engine;

pub use buffer::ChunkBuffer;
pub use engine::ResponseEngine;
