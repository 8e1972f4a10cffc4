use std::path::PathBuf;

/// VirtualBox machine registry: `~/.VirtualBox/VirtualBox.xml`
pub fn registry_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".VirtualBox")
        .join("VirtualBox.xml")
}

/// Optional config file: `~/.config/vbox-search/config.toml`
pub fn config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("vbox-search")
        .join("config.toml")
}
