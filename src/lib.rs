//! Kardboard - Kanban flow tracking and metrics

pub mod config;
pub mod db;
pub mod domain;
pub mod flow;
pub mod jobs;
pub mod reports;
pub mod state_machine;
pub mod tickets;
