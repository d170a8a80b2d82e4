pub mod defaults;
pub mod domains;
pub mod paths;
pub mod service;
pub mod settings;
pub mod validation;

pub use domains::{DomainProfile, DomainRegistry};
pub use paths::AppPaths;
pub use service::ConfigService;
pub use settings::Settings;
