// Binaried: a small social network backend
//
// This is the library root. Each module corresponds to a major subsystem
// of the server.

pub mod config;
pub mod db;
pub mod events;
pub mod media;
pub mod seed;
pub mod social;
pub mod status;
pub mod web;
