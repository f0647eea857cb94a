pub mod cli;
pub mod complexity;
pub mod counts;
pub mod error;
pub mod git;
pub mod model;
pub mod ports;
pub mod report;
pub mod run;
pub mod scheduler;
pub mod store;
pub mod streak;
pub mod util;
