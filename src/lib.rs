// src/lib.rs

pub mod chat;
pub mod config;
pub mod ingest;
pub mod janitor;
pub mod notebook;
pub mod ocr;
pub mod openai;
pub mod session;
pub mod tools;
