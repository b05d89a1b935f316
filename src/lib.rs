#![cfg_attr(not(any(test, feature = "host")), no_std)]

pub mod att;
pub mod chars;
pub mod client;
pub mod commands;
pub mod config;
pub mod debug;
pub mod logs;
pub mod transport;
pub mod uuid;
pub mod wed;

// Session layers need std for files, clocks and owned strings
#[cfg(feature = "host")]
pub mod driver;
#[cfg(feature = "host")]
pub mod firmware;
#[cfg(feature = "host")]
pub mod output;
#[cfg(feature = "host")]
pub mod session;

#[cfg(feature = "cli")]
pub mod bluez;
