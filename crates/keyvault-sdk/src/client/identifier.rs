//! Vault object identifiers.
//!
//! Every key, certificate and secret is addressed as
//! `https://{vault}/{collection}/{name}[/{version}]`.

use url::Url;

use crate::error::VaultError;

#[cfg(test)]
#[path = "identifier_tests.rs"]
mod tests;

/// Parsed vault object identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultObjectId {
    pub vault_url: String,
    pub collection: String,
    pub name: String,
    pub version: Option<String>,
}

impl VaultObjectId {
    /// Parse an identifier URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use keyvault_sdk::client::VaultObjectId;
    ///
    /// let id = VaultObjectId::parse("https://myvault.vault.azure.net/keys/signing/abc123").unwrap();
    /// assert_eq!(id.vault_url, "https://myvault.vault.azure.net");
    /// assert_eq!(id.collection, "keys");
    /// assert_eq!(id.name, "signing");
    /// assert_eq!(id.version.as_deref(), Some("abc123"));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `VaultError::InvalidResponse` when the value is not an absolute
    /// URL or does not carry a collection and name.
    pub fn parse(id: &str) -> Result<Self, VaultError> {
        let url = Url::parse(id)
            .map_err(|e| VaultError::invalid_response(format!("Invalid identifier '{}': {}", id, e)))?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|segment| !segment.is_empty()).collect())
            .unwrap_or_default();

        let (collection, name, version) = match segments.as_slice() {
            [collection, name] => (*collection, *name, None),
            [collection, name, version] => (*collection, *name, Some(version.to_string())),
            _ => {
                return Err(VaultError::invalid_response(format!(
                    "Identifier '{}' does not match {{collection}}/{{name}}[/{{version}}]",
                    id
                )))
            }
        };

        let mut vault_url = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
        if let Some(port) = url.port() {
            vault_url.push_str(&format!(":{}", port));
        }

        Ok(Self {
            vault_url,
            collection: collection.to_string(),
            name: name.to_string(),
            version,
        })
    }

    /// Name component of an identifier, or an empty string when it cannot be parsed.
    pub(crate) fn name_of(id: &str) -> String {
        Self::parse(id).map(|id| id.name).unwrap_or_default()
    }
}

/// Check that `name` is a valid vault object name: 1-127 ASCII letters, digits
/// and dashes.
///
/// Names are spliced into request paths, so anything else is rejected before a
/// request is built.
pub(crate) fn validate_name(name: &str) -> Result<(), VaultError> {
    let valid = !name.is_empty()
        && name.len() <= 127
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

    if valid {
        Ok(())
    } else {
        Err(VaultError::Configuration {
            message: format!("Invalid vault object name '{}'", name),
        })
    }
}
