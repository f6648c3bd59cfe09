//! Settlement Service - commission settlement and price cascade engine.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
