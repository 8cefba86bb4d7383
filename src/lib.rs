//! recwatch — unattended ingestion of recordings dropped on FTP stores.
//!
//! Polls one or more FTP endpoints, detects newly appeared files by
//! differencing consecutive listings, and runs the action chain (download,
//! MQTT notification, pause) of every pattern that matches a new file name.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod template;

pub mod publisher;
pub mod store;

pub mod action;
pub mod device;
pub mod pattern;

pub mod monitor;
