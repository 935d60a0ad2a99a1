pub mod extractor;
pub mod jwt;
pub mod slot_clock;
