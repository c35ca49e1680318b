pub mod protected;

pub use protected::{is_protected_package, is_shared_path};
