//! Locator resolution
//!
//! A [`PathResolver`] maps an asset kind and key to a locator. It is a pure
//! function of its context (game, version, base URL); it does no I/O and
//! never retries.

use crate::config::EngineConfig;
use crate::preload::manifest::AssetKind;

/// Maps `(kind, key)` to a locator
pub trait PathResolver: Send + Sync {
    fn resolve(&self, kind: AssetKind, key: &str) -> String;
}

impl<F> PathResolver for F
where
    F: Fn(AssetKind, &str) -> String + Send + Sync,
{
    fn resolve(&self, kind: AssetKind, key: &str) -> String {
        self(kind, key)
    }
}

/// `{base_url}/{game}/{version}/{dir}/{key}{ext}` with empty segments skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixResolver {
    pub base_url: String,
    pub game: String,
    pub version: String,
}

impl PrefixResolver {
    pub fn new(
        base_url: impl Into<String>,
        game: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            game: game.into(),
            version: version.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.base_url, &config.game, &config.version)
    }

    /// Directory and default extension per kind.
    pub fn layout(kind: AssetKind) -> (&'static str, &'static str) {
        match kind {
            AssetKind::Image => ("images", ".png"),
            AssetKind::Atlas => ("atlases", ".json"),
            AssetKind::SkeletalPackage => ("spine", ".json"),
            AssetKind::StructuredData => ("data", ".json"),
            AssetKind::Audio => ("audio", ".ogg"),
            AssetKind::Font => ("fonts", ".woff2"),
        }
    }
}

impl PathResolver for PrefixResolver {
    fn resolve(&self, kind: AssetKind, key: &str) -> String {
        let (dir, ext) = Self::layout(kind);
        let file = if has_extension(key) {
            key.to_string()
        } else {
            format!("{key}{ext}")
        };

        let base = self.base_url.trim_end_matches('/');
        let segments = [self.game.as_str(), self.version.as_str(), dir, file.as_str()];
        let path = segments
            .iter()
            .map(|segment| segment.trim_matches('/'))
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");

        if base.is_empty() {
            path
        } else {
            format!("{base}/{path}")
        }
    }
}

/// Resolves `relative` against the directory of `base_locator`.
///
/// Absolute paths and URLs are returned unchanged.
pub fn join_relative(base_locator: &str, relative: &str) -> String {
    if relative.starts_with('/') || relative.contains("://") {
        return relative.to_string();
    }
    match base_locator.rfind('/') {
        Some(slash) => format!("{}/{}", &base_locator[..slash], relative),
        None => relative.to_string(),
    }
}

fn has_extension(key: &str) -> bool {
    let file = key.rsplit('/').next().unwrap_or(key);
    file.rfind('.').is_some_and(|dot| dot > 0 && dot + 1 < file.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_resolver() {
        let resolver = PrefixResolver::new("https://cdn.example.com/", "lucky7", "1.2.0");
        assert_eq!(
            resolver.resolve(AssetKind::Image, "logo"),
            "https://cdn.example.com/lucky7/1.2.0/images/logo.png"
        );
        assert_eq!(
            resolver.resolve(AssetKind::Audio, "spin.mp3"),
            "https://cdn.example.com/lucky7/1.2.0/audio/spin.mp3"
        );
    }

    #[test]
    fn test_empty_segments_skipped() {
        let resolver = PrefixResolver::default();
        assert_eq!(resolver.resolve(AssetKind::Font, "main"), "fonts/main.woff2");
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |kind: AssetKind, key: &str| format!("{kind:?}/{key}");
        assert_eq!(resolver.resolve(AssetKind::Atlas, "ui"), "Atlas/ui");
    }

    #[test]
    fn test_join_relative() {
        assert_eq!(join_relative("atlases/ui.json", "ui.png"), "atlases/ui.png");
        assert_eq!(join_relative("ui.json", "ui.png"), "ui.png");
        assert_eq!(
            join_relative("https://cdn/a/ui.json", "pages/ui.png"),
            "https://cdn/a/pages/ui.png"
        );
        assert_eq!(join_relative("a/ui.json", "/abs/ui.png"), "/abs/ui.png");
    }
}
