//! linkrelay core library
//! URL codec, interception routing, outbound request rebuilding and streamed relay

pub mod config;
pub mod proxy;
