pub mod dna;
pub mod progress;
