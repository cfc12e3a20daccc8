// Library for tests to access modules

pub mod collector;
pub mod config;
pub mod downsample;
pub mod models;
pub mod publisher;
pub mod query;
pub mod scheduler;
pub mod source;
