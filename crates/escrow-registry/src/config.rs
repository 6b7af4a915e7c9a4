//! Registry configuration from environment variables.

use crate::domain::entities::RepeatRevealPolicy;
use crate::domain::services::compute_contract_address;
use crate::domain::value_objects::Address;
use crate::errors::ConfigError;
use std::env;

/// Creation code used when none is configured.
///
/// Identifies version 1 of the escrow initialization logic. Any change to
/// escrow behavior must bump it, since it feeds every derived address.
pub const DEFAULT_ESCROW_CREATION_CODE: &[u8] = b"hashlock-escrow/escrow/v1";

/// Configuration of a registry instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Explicit registry address. When `None` the registry sits at the CREATE
    /// address of (`deployer`, `deployer_nonce`).
    pub registry_address: Option<Address>,

    /// Account that deployed the registry.
    pub deployer: Address,

    /// Deployer nonce used for the registry deployment.
    pub deployer_nonce: u64,

    /// Trusted forwarder; zero disables forwarding.
    pub relay_identity: Address,

    /// Escrow initialization logic, prefixed to the encoded arguments.
    pub escrow_creation_code: Vec<u8>,

    /// Whether the same commitment may be counted twice.
    pub repeat_reveals: RepeatRevealPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registry_address: None,
            deployer: Address::ZERO,
            deployer_nonce: 0,
            relay_identity: Address::ZERO,
            escrow_creation_code: DEFAULT_ESCROW_CREATION_CODE.to_vec(),
            repeat_reveals: RepeatRevealPolicy::Reject,
        }
    }
}

impl RegistryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `ESCROW_REGISTRY_ADDRESS`: Registry address (default: derived from deployer)
    /// - `ESCROW_DEPLOYER`: Deployer address (default: zero)
    /// - `ESCROW_DEPLOYER_NONCE`: Deployer nonce (default: 0)
    /// - `ESCROW_RELAY_IDENTITY`: Trusted forwarder (default: zero, none)
    /// - `ESCROW_CREATION_CODE`: Hex creation code (default: built-in v1)
    /// - `ESCROW_REPEAT_REVEALS`: `reject` or `permit` (default: reject)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`RegistryConfig::from_env`] but reading from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let address = |var: &str| -> Result<Option<Address>, ConfigError> {
            lookup(var)
                .map(|value| {
                    value.trim().parse().map_err(|_| ConfigError::InvalidAddress {
                        var: var.to_string(),
                        value,
                    })
                })
                .transpose()
        };

        let config = Self {
            registry_address: address("ESCROW_REGISTRY_ADDRESS")?,
            deployer: address("ESCROW_DEPLOYER")?.unwrap_or(defaults.deployer),
            deployer_nonce: lookup("ESCROW_DEPLOYER_NONCE")
                .map(|v| v.trim().parse().map_err(|_| ConfigError::InvalidNonce(v)))
                .transpose()?
                .unwrap_or(defaults.deployer_nonce),
            relay_identity: address("ESCROW_RELAY_IDENTITY")?.unwrap_or(defaults.relay_identity),
            escrow_creation_code: lookup("ESCROW_CREATION_CODE")
                .map(|v| {
                    let trimmed = v.trim();
                    hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
                        .map_err(|e| ConfigError::InvalidCreationCode(e.to_string()))
                })
                .transpose()?
                .unwrap_or(defaults.escrow_creation_code),
            repeat_reveals: lookup("ESCROW_REPEAT_REVEALS")
                .map(|v| v.trim().parse().map_err(ConfigError::InvalidPolicy))
                .transpose()?
                .unwrap_or(defaults.repeat_reveals),
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the registry cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.escrow_creation_code.is_empty() {
            return Err(ConfigError::EmptyCreationCode);
        }
        Ok(())
    }

    /// Address the registry lives at.
    #[must_use]
    pub fn registry_address(&self) -> Address {
        self.registry_address
            .unwrap_or_else(|| compute_contract_address(self.deployer, self.deployer_nonce))
    }

    /// Builder-style override of the repeat-reveal policy.
    #[must_use]
    pub fn with_repeat_reveals(mut self, policy: RepeatRevealPolicy) -> Self {
        self.repeat_reveals = policy;
        self
    }

    /// Builder-style override of the trusted forwarder.
    #[must_use]
    pub fn with_relay_identity(mut self, relay_identity: Address) -> Self {
        self.relay_identity = relay_identity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.repeat_reveals, RepeatRevealPolicy::Reject);
        assert_eq!(
            config.registry_address(),
            compute_contract_address(Address::ZERO, 0)
        );
    }

    #[test]
    fn test_from_lookup_empty_matches_default() {
        assert_eq!(
            RegistryConfig::from_lookup(lookup(&[])).unwrap(),
            RegistryConfig::default()
        );
    }

    #[test]
    fn test_from_lookup_reads_all_variables() {
        let config = RegistryConfig::from_lookup(lookup(&[
            ("ESCROW_DEPLOYER", "0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0"),
            ("ESCROW_DEPLOYER_NONCE", "1"),
            ("ESCROW_RELAY_IDENTITY", "0x0000000000000000000000000000000000000099"),
            ("ESCROW_CREATION_CODE", "0x6080"),
            ("ESCROW_REPEAT_REVEALS", "permit"),
        ]))
        .unwrap();

        assert_eq!(config.deployer_nonce, 1);
        assert_eq!(config.relay_identity.as_bytes()[19], 0x99);
        assert_eq!(config.escrow_creation_code, vec![0x60, 0x80]);
        assert_eq!(config.repeat_reveals, RepeatRevealPolicy::Permit);
        assert_eq!(
            config.registry_address(),
            compute_contract_address(config.deployer, 1)
        );
    }

    #[test]
    fn test_explicit_registry_address_wins() {
        let config = RegistryConfig::from_lookup(lookup(&[(
            "ESCROW_REGISTRY_ADDRESS",
            "0x00000000000000000000000000000000000000aa",
        )]))
        .unwrap();
        assert_eq!(config.registry_address().as_bytes()[19], 0xaa);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            RegistryConfig::from_lookup(lookup(&[("ESCROW_DEPLOYER", "nope")])),
            Err(ConfigError::InvalidAddress { .. })
        ));
        assert!(matches!(
            RegistryConfig::from_lookup(lookup(&[("ESCROW_DEPLOYER_NONCE", "-1")])),
            Err(ConfigError::InvalidNonce(_))
        ));
        assert!(matches!(
            RegistryConfig::from_lookup(lookup(&[("ESCROW_REPEAT_REVEALS", "sometimes")])),
            Err(ConfigError::InvalidPolicy(_))
        ));
        assert_eq!(
            RegistryConfig::from_lookup(lookup(&[("ESCROW_CREATION_CODE", "0x")])),
            Err(ConfigError::EmptyCreationCode)
        );
    }
}
