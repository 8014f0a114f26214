//! Services for talking to the MedFeed backend

pub mod api_client;

pub use api_client::ApiClient;
