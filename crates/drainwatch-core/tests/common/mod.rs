#![allow(dead_code)]

pub mod campaign_server;
pub mod scripted;
