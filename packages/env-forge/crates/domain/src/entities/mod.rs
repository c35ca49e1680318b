pub mod app;
pub mod plugin;

pub use app::AppDescriptor;
pub use plugin::{PluginDescriptor, PluginInfo};
