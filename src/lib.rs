pub mod app;
pub mod atendimentos;
pub mod auth;
pub mod config;
pub mod error;
pub mod flash;
pub mod pacientes;
pub mod state;
