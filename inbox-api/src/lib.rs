pub mod auth;
pub mod items;
pub mod resources;
pub mod server;
pub mod tenancy;
pub mod webhooks;

pub use server::run;
