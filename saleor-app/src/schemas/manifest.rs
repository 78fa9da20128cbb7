//! App manifest served to the platform during installation.

use serde::{Deserialize, Serialize};

use crate::config::AppSettings;
use crate::error::AppError;

/// Where a dashboard extension opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtensionTarget {
    Popup,
    AppPage,
}

/// A dashboard extension the app contributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub label: String,
    /// Dashboard mount point, e.g. `PRODUCT_OVERVIEW_MORE_ACTIONS`
    pub mount: String,
    pub target: ExtensionTarget,
    pub permissions: Vec<String>,
    pub url: String,
}

/// Static description of the app's identity, permissions and endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    pub permissions: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<Extension>,
    pub data_privacy: String,
    pub data_privacy_url: String,
    pub homepage_url: String,
    pub support_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_url: Option<String>,
    pub app_url: String,
    /// Where the platform posts the installation token. Defaults to this
    /// app's install endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_target_url: Option<String>,
}

impl Manifest {
    /// Fill in URLs that default to this app's own routes.
    pub fn resolve(mut self, settings: &AppSettings) -> Result<Self, AppError> {
        if self.token_target_url.is_none() {
            self.token_target_url = Some(settings.public_route("/configuration/install")?);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> Manifest {
        Manifest {
            id: "example.order-sync".to_string(),
            name: "Order Sync".to_string(),
            version: "0.1.0".to_string(),
            about: None,
            permissions: vec!["MANAGE_ORDERS".to_string()],
            extensions: vec![Extension {
                label: "Sync now".to_string(),
                mount: "ORDER_DETAILS_MORE_ACTIONS".to_string(),
                target: ExtensionTarget::Popup,
                permissions: vec!["MANAGE_ORDERS".to_string()],
                url: "https://app.example.com/sync".to_string(),
            }],
            data_privacy: "No personal data stored".to_string(),
            data_privacy_url: "https://app.example.com/privacy".to_string(),
            homepage_url: "https://app.example.com".to_string(),
            support_url: "https://app.example.com/support".to_string(),
            configuration_url: None,
            app_url: "https://app.example.com/app".to_string(),
            token_target_url: None,
        }
    }

    #[test]
    fn test_resolve_defaults_token_target_url() {
        let settings = AppSettings {
            public_url: "https://app.example.com".to_string(),
            ..Default::default()
        };
        let resolved = manifest().resolve(&settings).unwrap();
        assert_eq!(
            resolved.token_target_url.as_deref(),
            Some("https://app.example.com/configuration/install")
        );
    }

    #[test]
    fn test_resolve_keeps_explicit_token_target_url() {
        let mut m = manifest();
        m.token_target_url = Some("https://elsewhere.example.com/install".to_string());
        let resolved = m.resolve(&AppSettings::default()).unwrap();
        assert_eq!(
            resolved.token_target_url.as_deref(),
            Some("https://elsewhere.example.com/install")
        );
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(manifest()).unwrap();
        assert_eq!(json["dataPrivacyUrl"], "https://app.example.com/privacy");
        assert_eq!(json["extensions"][0]["target"], "POPUP");
        assert!(json.get("about").is_none());
        assert!(json.get("tokenTargetUrl").is_none());
    }
}
