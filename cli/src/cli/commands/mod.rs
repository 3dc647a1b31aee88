pub mod codec;
pub mod start;
pub mod status;
