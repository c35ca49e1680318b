pub mod history;
pub mod install;
pub mod remove;
pub mod undo;
pub mod validate;
pub mod versions;

use indicatif::{ProgressBar, ProgressStyle};

pub(crate) fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message(message);
    pb
}
