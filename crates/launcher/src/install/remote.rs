//! Remote metadata shapes
//!
//! Serde types for the release-metadata endpoint and the asset-manifest
//! endpoint. Fetched once per provisioning pass, never persisted.

use serde::{Deserialize, Serialize};

/// Release metadata for the injector framework
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    /// Version tag, compared against the local marker
    pub tag: String,
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseDescriptor {
    pub fn asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

/// A named downloadable asset in a release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub size: u64,
}

/// Content-asset bundle manifest.
///
/// Carries either a single package URL or an explicit file list; both at
/// once is allowed, in which case the single package wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetManifest {
    pub version: u32,
    #[serde(default, rename = "packageUrl")]
    pub package_url: Option<String>,
    #[serde(default)]
    pub assets: Option<Vec<AssetFile>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetFile {
    #[serde(rename = "fileName")]
    pub file_name: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_asset_lookup() {
        let descriptor = ReleaseDescriptor {
            tag: "v2.0".to_string(),
            assets: vec![
                ReleaseAsset {
                    name: "symbols.zip".to_string(),
                    url: "https://x/symbols.zip".to_string(),
                    size: 10,
                },
                ReleaseAsset {
                    name: "injector-release.7z".to_string(),
                    url: "https://x/latest.7z".to_string(),
                    size: 20,
                },
            ],
        };
        assert_eq!(
            descriptor.asset("injector-release.7z").unwrap().url,
            "https://x/latest.7z"
        );
        assert!(descriptor.asset("missing").is_none());
    }

    #[test]
    fn manifest_accepts_either_shape() {
        let single: AssetManifest =
            serde_json::from_str(r#"{"version": 3, "packageUrl": "https://x/assets.zip"}"#).unwrap();
        assert_eq!(single.version, 3);
        assert!(single.package_url.is_some());
        assert!(single.assets.is_none());

        let listed: AssetManifest = serde_json::from_str(
            r#"{"version": 4, "assets": [{"fileName": "ui/icon.tex", "url": "https://x/icon.tex"}]}"#,
        )
        .unwrap();
        assert_eq!(listed.assets.unwrap()[0].file_name, "ui/icon.tex");
    }
}
