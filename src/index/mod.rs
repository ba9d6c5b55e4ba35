pub mod bwt;
pub mod fm;
pub mod lcp;
pub mod packed;
pub mod sa;
pub mod text;
