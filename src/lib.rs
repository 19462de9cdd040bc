pub mod config;
pub mod form;
pub mod id;
pub mod persistence;
pub mod prelude;
pub mod site;

pub use config::{ConfigError, FormsConfig};
