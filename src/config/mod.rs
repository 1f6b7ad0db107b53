mod settings;

pub use settings::{AlertChannel, ChannelKind, CredentialProfile, Project, ProviderKind, WatcherConfig};
