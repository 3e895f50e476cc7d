mod loader;
mod pattern;

pub use loader::{default_rules, BuildConfig, Config, OrphanConfig};
pub use pattern::NamePattern;
