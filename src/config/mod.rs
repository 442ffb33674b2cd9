mod defaults;
mod parser;
mod settings;
mod validation;

pub use settings::{AppConfig, CoreConfig, Excludes, Profile, Strategy};
