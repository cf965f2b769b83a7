pub mod auth;
pub mod cleanup;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod resumes;
pub mod routes;
pub mod state;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
mod test_support;
