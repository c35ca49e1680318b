use std::path::Path;

/// Packages the engine refuses to remove without an explicit force
/// override. Removing any of these breaks the base system.
const PROTECTED_PACKAGES: &[&str] = &[
    "linux",
    "systemd",
    "glibc",
    "bash",
    "sudo",
    "coreutils",
    "filesystem",
    "util-linux",
    "openssh",
    "pacman",
];

/// Path prefixes shared between applications. A config destination under
/// one of these may be owned by more than one app.
const SHARED_PATH_PREFIXES: &[&str] = &["/etc/", "/usr/share/", "/usr/local/share/"];

/// Dotfiles commonly co-edited by several tools.
const SHARED_DOTFILES: &[&str] = &[".bashrc", ".zshrc", ".profile", ".gitconfig", ".config"];

pub fn is_protected_package(name: &str) -> bool {
    PROTECTED_PACKAGES.contains(&name)
}

/// Whether a config destination falls under a known shared location.
pub fn is_shared_path(path: &Path) -> bool {
    let text = path.to_string_lossy();
    if SHARED_PATH_PREFIXES.iter().any(|p| text.starts_with(p)) {
        return true;
    }
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| SHARED_DOTFILES.contains(&s))
            .unwrap_or(false)
    })
}
