pub mod apps;
pub mod registry;
pub mod services;

pub use apps::StateFileAppRepository;
pub use registry::DirectoryPluginRegistry;
pub use services::SystemctlInspector;
