pub mod config;
pub mod dispatcher;
pub mod error;
pub mod helpers;
pub mod model;
pub mod processor;
pub mod resolver;
pub mod server;
pub mod startup;
pub mod worker;
