pub mod extractors;
pub mod orders;
pub mod webhook;
