pub mod calendar;
pub mod config;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod journal;
pub mod limits;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod ports;
pub mod report;
pub mod source;
