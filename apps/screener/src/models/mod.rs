pub mod candidate;
pub mod evaluation;
pub mod profile;
