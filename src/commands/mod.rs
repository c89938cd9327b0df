pub mod api;
pub mod body_parts;
pub mod cdn;
pub mod config;
pub mod download;
pub mod logs;
pub mod mesh;
pub mod report;
pub mod resolve;
pub mod scan;
