pub mod api;
pub mod geo;
pub mod models;
pub mod validation;
