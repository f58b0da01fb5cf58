#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("bus error: {0}")]
    Bus(#[from] zbus::Error),

    #[error("bus call failed: {0}")]
    Fdo(#[from] zbus::fdo::Error),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
