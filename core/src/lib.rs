pub mod cache;
pub mod image;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod platform;
pub mod push;
pub mod reminders;
pub mod remote;
pub mod retry;
pub mod store;

#[cfg(test)]
mod testing;
