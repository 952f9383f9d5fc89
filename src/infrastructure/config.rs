// Infrastructure: registry settings read from the environment

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const ADDRESS_VAR: &str = "QOBLIB_REGISTRY_ADDR";
pub const STORE_DIR_VAR: &str = "QOBLIB_STORE_DIR";

pub const DEFAULT_ADDRESS: &str = "0.0.0.0:50061";
pub const DEFAULT_STORE_DIR: &str = "qoblib_store";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{var} is not a socket address: '{value}'")]
    InvalidAddress { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    pub address: SocketAddr,
    pub store_dir: PathBuf,
}

impl RegistrySettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_values(env::var(ADDRESS_VAR).ok(), env::var(STORE_DIR_VAR).ok())
    }

    /// Build settings from optional raw values; blank values fall back to defaults
    pub fn from_values(
        address: Option<String>,
        store_dir: Option<String>,
    ) -> Result<Self, SettingsError> {
        let address = address
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
        let address: SocketAddr = address
            .trim()
            .parse()
            .map_err(|_| SettingsError::InvalidAddress {
                var: ADDRESS_VAR,
                value: address.clone(),
            })?;

        let store_dir = store_dir
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR));

        Ok(Self { address, store_dir })
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([0, 0, 0, 0], 50061)),
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_and_blank_values() {
        let settings = RegistrySettings::from_values(None, Some("  ".into())).unwrap();
        assert_eq!(settings, RegistrySettings::default());
        assert_eq!(settings.address.to_string(), DEFAULT_ADDRESS);
    }

    #[test]
    fn explicit_values_win() {
        let settings =
            RegistrySettings::from_values(Some("127.0.0.1:6000".into()), Some("/srv/ommx".into()))
                .unwrap();
        assert_eq!(settings.address.port(), 6000);
        assert_eq!(settings.store_dir, PathBuf::from("/srv/ommx"));
    }

    #[test]
    fn malformed_address_is_reported() {
        let err = RegistrySettings::from_values(Some("localhost".into()), None).unwrap_err();
        assert!(err.to_string().contains(ADDRESS_VAR));
    }
}
