//! Integration tests wiring exchange channels back to back over
//! `MemoryChannel` pairs.


mod concurrency;
mod flows;
