use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("i2c error: {0}")]
    I2c(String),
    #[error("invalid bus path: {0}")]
    BusPath(String),
    #[error("bus port {port} is not routed (selected mask {mask:#04x})")]
    NotRouted { port: u8, mask: u8 },
    #[error("no device answering at {address:#04x}")]
    NoDevice { address: u8 },
    #[error("port {0} out of range")]
    PortRange(u8),
    #[error("injected fault at {0}")]
    Injected(&'static str),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
