//! Structured run logging: append-only JSONL with stderr fallback.

pub mod jsonl;
