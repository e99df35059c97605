#![allow(dead_code)]

pub mod fake_source;
pub mod ftp_server;
pub mod socket_guard;
