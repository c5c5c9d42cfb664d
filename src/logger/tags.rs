/// Log tags identify the subsystem a message comes from.
///
/// Each tag has a debug key used by `--debug-<key>` and `--verbose-<key>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Engine,
    Scheduler,
    Relay,
    Gateway,
    Wallets,
    Sessions,
    Rpc,
    Notify,
    Test,
    Other(String),
}

impl LogTag {
    /// Key matched against `--debug-<key>` flags
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::Engine => "engine".to_string(),
            LogTag::Scheduler => "scheduler".to_string(),
            LogTag::Relay => "relay".to_string(),
            LogTag::Gateway => "gateway".to_string(),
            LogTag::Wallets => "wallets".to_string(),
            LogTag::Sessions => "sessions".to_string(),
            LogTag::Rpc => "rpc".to_string(),
            LogTag::Notify => "notify".to_string(),
            LogTag::Test => "test".to_string(),
            LogTag::Other(name) => name.to_lowercase(),
        }
    }

    /// Uncolored label used in log files
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::Other(name) => name.to_uppercase(),
            other => other.to_debug_key().to_uppercase(),
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
