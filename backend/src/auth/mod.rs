pub mod middleware;
pub mod models;
pub mod wagri_service;
