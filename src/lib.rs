//! orgchart: an employee hierarchy store that keeps the reporting lines a
//! forest, persists every change and mirrors employees to an external board.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
