pub mod capture;
pub mod cli;
pub mod command;
pub mod errors;
pub mod events;
pub mod grader;
pub mod listener;
pub mod registry;
pub mod report;
pub mod result;
pub mod strategy;
pub mod suite;
pub mod visibility;
