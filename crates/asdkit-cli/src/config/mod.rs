mod builder;
mod defaults;
mod file;

pub use builder::AppConfig;
