use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use url::Url;

const APP_DIR: &str = "clickpanel";
const CONFIG_FILE: &str = "config.toml";
const SESSION_FILE: &str = "session.json";
const SCOPED_FILE: &str = "scoped-session.json";

const DEFAULT_BACKEND_URL: &str = "http://localhost:3001";
const DEFAULT_AUTHORIZE_URL: &str = "https://app.clickup.com/api";

const ENV_BACKEND_URL: &str = "CLICKPANEL_BACKEND_URL";
const ENV_CLIENT_ID: &str = "CLICKPANEL_CLIENT_ID";
const ENV_REDIRECT_URI: &str = "CLICKPANEL_REDIRECT_URI";

/// Panel configuration loaded from `<config_dir>/clickpanel/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PanelConfig {
    /// Base URL of the backend proxy.
    pub backend_url: String,
    /// OAuth client id.
    pub client_id: Option<String>,
    /// OAuth redirect URI registered for the client.
    pub redirect_uri: Option<String>,
    /// Authorization page of the remote service.
    pub authorize_url: String,
    /// Directory holding the durable session file.
    pub session_dir: Option<PathBuf>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_owned(),
            client_id: None,
            redirect_uri: None,
            authorize_url: DEFAULT_AUTHORIZE_URL.to_owned(),
            session_dir: None,
        }
    }
}

impl PanelConfig {
    /// Load configuration from `path`, or the default location when `None`.
    ///
    /// A missing file yields the defaults. Environment variables override
    /// file values.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or the result
    /// fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut fetch = |key: &'static str| env::var(key).ok();
        Self::load_with_env(path, &mut fetch)
    }

    fn load_with_env(
        path: Option<&Path>,
        fetch: &mut impl FnMut(&'static str) -> Option<String>,
    ) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(default_config_path);
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(fetch);
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration file without environment overrides.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    fn apply_env(&mut self, fetch: &mut impl FnMut(&'static str) -> Option<String>) {
        let mut value = |key| fetch(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        if let Some(url) = value(ENV_BACKEND_URL) {
            self.backend_url = url;
        }
        if let Some(id) = value(ENV_CLIENT_ID) {
            self.client_id = Some(id);
        }
        if let Some(uri) = value(ENV_REDIRECT_URI) {
            self.redirect_uri = Some(uri);
        }
    }

    fn validate(&self) -> Result<()> {
        Url::parse(&self.backend_url)
            .with_context(|| format!("backend_url is not a valid URL: {}", self.backend_url))?;
        Url::parse(&self.authorize_url)
            .with_context(|| format!("authorize_url is not a valid URL: {}", self.authorize_url))?;
        if let Some(uri) = &self.redirect_uri {
            Url::parse(uri).with_context(|| format!("redirect_uri is not a valid URL: {uri}"))?;
        }
        if self.client_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            bail!("client_id must not be empty");
        }
        Ok(())
    }

    /// Authorization link the user opens to sign in.
    ///
    /// # Errors
    /// Returns an error when `client_id` or `redirect_uri` is not configured.
    pub fn authorize_link(&self) -> Result<String> {
        let client_id = self
            .client_id
            .as_deref()
            .context("client_id is not configured")?;
        let redirect_uri = self
            .redirect_uri
            .as_deref()
            .context("redirect_uri is not configured")?;
        let mut link = Url::parse(&self.authorize_url)?;
        link.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri);
        Ok(link.into())
    }

    /// Location of the durable session file.
    ///
    /// # Errors
    /// Returns an error when no configuration directory can be determined.
    pub fn durable_session_path(&self) -> Result<PathBuf> {
        let dir = match &self.session_dir {
            Some(dir) => dir.clone(),
            None => dirs::config_dir()
                .context("could not determine the configuration directory")?
                .join(APP_DIR),
        };
        Ok(dir.join(SESSION_FILE))
    }

    /// Location of the per-login-session file holding spent codes.
    #[must_use]
    pub fn scoped_session_path(&self) -> PathBuf {
        dirs::runtime_dir()
            .unwrap_or_else(env::temp_dir)
            .join(APP_DIR)
            .join(SCOPED_FILE)
    }
}

/// Default configuration file location.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}
