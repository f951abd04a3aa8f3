//! `.npmrc` discovery.
//!
//! Reads the registry URL and per-registry `_authToken` entries the way npm
//! does for the two locations that matter here: the project file in the
//! working directory and the user file in the home directory. The project
//! file wins when both define the same key.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use reqwest::Url;
use tracing::debug;

/// Registry used when nothing else is configured.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// Settings read from `.npmrc` files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NpmConfig {
    /// `registry=` entry, if any.
    pub registry: Option<String>,
    /// `//host/path/:_authToken=` entries keyed by `//host/path/`.
    pub tokens: BTreeMap<String, String>,
}

impl NpmConfig {
    /// Load `<cwd>/.npmrc` and `~/.npmrc`, ignoring files that do not exist.
    pub fn load(cwd: &Path) -> Self {
        let mut files: Vec<PathBuf> = Vec::new();
        if let Some(home) = dirs::home_dir() {
            files.push(home.join(".npmrc"));
        }
        files.push(cwd.join(".npmrc"));

        let mut config = Self::default();
        for path in files {
            match std::fs::read_to_string(&path) {
                Ok(contents) => {
                    debug!(path = %path.display(), "loaded npmrc");
                    config.merge(Self::parse(&contents));
                }
                Err(e) => debug!(path = %path.display(), "skipping npmrc: {e}"),
            }
        }
        config
    }

    /// Parse the contents of one `.npmrc` file.
    ///
    /// `${VAR}` references are expanded from the environment; unset variables
    /// expand to nothing.
    pub fn parse(contents: &str) -> Self {
        let mut config = Self::default();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = expand_env(value.trim().trim_matches('"'));

            if key == "registry" {
                config.registry = Some(value);
            } else if let Some(scope) = key.strip_suffix(":_authToken") {
                if scope.starts_with("//") {
                    // Keys carry no scheme; parse them as https to normalise the host.
                    let key = nerf_dart(&format!("https:{scope}"))
                        .unwrap_or_else(|| with_trailing_slash(scope));
                    config.tokens.insert(key, value);
                }
            }
        }
        config
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(&mut self, other: Self) {
        if other.registry.is_some() {
            self.registry = other.registry;
        }
        self.tokens.extend(other.tokens);
    }

    /// Configured registry, or the public npm registry.
    pub fn registry_or_default(&self) -> &str {
        self.registry.as_deref().unwrap_or(DEFAULT_REGISTRY)
    }

    /// Token for `registry_url`, picking the longest matching `//host/path/` key.
    pub fn token_for(&self, registry_url: &str) -> Option<&str> {
        let nerfed = nerf_dart(registry_url)?;
        self.tokens
            .iter()
            .filter(|(key, _)| nerfed.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, token)| token.as_str())
    }
}

/// `https://host/path` -> `//host/path/`, the key form npm uses for credentials.
///
/// The host is lowercased and default ports are dropped, so equivalent
/// spellings of one registry share a key.
fn nerf_dart(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let host = url.host_str()?;
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    Some(with_trailing_slash(&format!("//{host}{port}{}", url.path())))
}

fn with_trailing_slash(s: &str) -> String {
    if s.ends_with('/') {
        s.to_string()
    } else {
        format!("{s}/")
    }
}

fn expand_env(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        if let Some(end) = after.find('}') {
            out.push_str(&std::env::var(&after[..end]).unwrap_or_default());
            rest = &after[end + 1..];
        } else {
            out.push_str(&rest[start..]);
            rest = "";
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registry_and_tokens() {
        let config = NpmConfig::parse(
            r"
            # company registry
            registry=https://npm.polydev.blue/
            //npm.polydev.blue/:_authToken=secret
            //registry.npmjs.org/:_authToken=public
            ; comment
            always-auth=true
            ",
        );
        assert_eq!(config.registry.as_deref(), Some("https://npm.polydev.blue/"));
        assert_eq!(config.token_for("https://npm.polydev.blue"), Some("secret"));
        assert_eq!(
            config.token_for("https://registry.npmjs.org/"),
            Some("public")
        );
        assert_eq!(config.token_for("https://other.example.com"), None);
    }

    #[test]
    fn test_token_lookup_normalises_host_and_port() {
        let config = NpmConfig::parse("//NPM.acme.dev/:_authToken=secret\n");
        assert_eq!(config.token_for("https://npm.acme.dev"), Some("secret"));
        assert_eq!(config.token_for("https://NPM.ACME.dev:443/"), Some("secret"));
        assert_eq!(config.token_for("https://npm.acme.dev:8443/"), None);
        assert_eq!(nerf_dart("http://127.0.0.1:4873").as_deref(), Some("//127.0.0.1:4873/"));
        assert_eq!(nerf_dart("not a url"), None);
    }

    #[test]
    fn test_longest_token_key_wins() {
        let config = NpmConfig::parse(
            "//host/:_authToken=root\n//host/team/:_authToken=team\n",
        );
        assert_eq!(config.token_for("https://host/team"), Some("team"));
        assert_eq!(config.token_for("https://host/other"), Some("root"));
    }

    #[test]
    fn test_env_expansion() {
        // PATH is set in every test environment.
        let path = std::env::var("PATH").unwrap();
        let config = NpmConfig::parse("//host/:_authToken=${PATH}\n");
        assert_eq!(config.token_for("https://host"), Some(path.as_str()));

        assert_eq!(expand_env("a${SOURCEMAPS_SURELY_UNSET_VAR}b"), "ab");
        assert_eq!(expand_env("x${unterminated"), "x${unterminated");
    }

    #[test]
    fn test_merge_prefers_later_file() {
        let mut user = NpmConfig::parse("registry=https://a/\n//a/:_authToken=1\n");
        user.merge(NpmConfig::parse("registry=https://b/\n"));
        assert_eq!(user.registry_or_default(), "https://b/");
        assert_eq!(user.token_for("https://a/"), Some("1"));
        assert_eq!(NpmConfig::default().registry_or_default(), DEFAULT_REGISTRY);
    }

    #[test]
    fn test_load_reads_project_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".npmrc"),
            "registry=https://project.example/\n",
        )
        .unwrap();
        let config = NpmConfig::load(dir.path());
        assert_eq!(config.registry.as_deref(), Some("https://project.example/"));
    }
}
