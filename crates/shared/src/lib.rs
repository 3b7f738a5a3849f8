pub mod briefing;
pub mod config;
pub mod email;
pub mod extract;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod push;
pub mod repos;
pub mod timezone;
pub mod whatsapp;
