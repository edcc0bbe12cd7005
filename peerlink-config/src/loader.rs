use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};
use thiserror::Error;

use peerlink_model::FederationPolicy;

use super::{
    models::{
        AdminToken, AuthConfig, Config, ConfigMetadata, FederationSettings,
        MergeSettings, ServerConfig,
    },
    sources::{EnvConfig, FileConfig, FileFederationConfig, FileMergeConfig},
    store,
    util::parse_duration,
    validation::{self, ConfigWarnings},
};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8097;

static DEFAULT_CONFIG_LOCATIONS: LazyLock<Vec<PathBuf>> = LazyLock::new(|| {
    vec![
        PathBuf::from("peerlink.toml"),
        PathBuf::from("config/peerlink.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Loads `.env`, then composes the process environment over the file.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Composes a configuration from an explicit environment snapshot.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) =
            self.compose_config(file_config, env, config_path)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = if let Some(explicit) = &self.options.config_path
        {
            (Some(explicit.clone()), true)
        } else if let Some(from_env) = &env_config.config_path {
            (Some(from_env.clone()), true)
        } else {
            let default = DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
                .cloned();
            (default, false)
        };

        let Some(path) = path else {
            return Ok((None, None));
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents =
            fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
                path: path.clone(),
                source: err,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;

        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
    ) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if config_path.is_none() {
            warnings.push_with_hint(
                "No peerlink.toml detected; falling back to environment variables",
                "Pass --config or set PEERLINK_CONFIG to point at a configuration file",
            );
        }

        let FileConfig {
            server: file_server,
            federation: file_federation,
            merge: file_merge,
            auth: file_auth,
            state_path: file_state_path,
        } = file_config.unwrap_or_default();

        let port = match env.server_port.as_deref() {
            Some(raw) => raw.parse::<u16>().map_err(|err| {
                ConfigLoadError::InvalidValue {
                    field: "SERVER_PORT",
                    reason: format!("'{raw}' is not a port: {err}"),
                }
            })?,
            None => file_server.port.unwrap_or(DEFAULT_PORT),
        };
        let server = ServerConfig {
            host: env
                .server_host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
        };

        let state_path = env.state_path.clone().or(file_state_path);
        let persisted = match state_path.as_deref() {
            Some(path) => store::read_state(path)?,
            None => None,
        };
        let state_loaded = persisted.is_some();
        let mut federation =
            persisted.unwrap_or_else(|| settings_from_file(file_federation));
        apply_policy_overrides(&mut federation.policy, &env);

        let merge = compose_merge(file_merge, &env)?;

        let auth = AuthConfig {
            admin_token: env
                .admin_token
                .clone()
                .or(file_auth.admin_token)
                .and_then(AdminToken::new),
        };

        let config = Config {
            server,
            federation,
            merge,
            auth,
            state_path,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded: false,
                state_loaded,
            },
        };

        warnings.extend(validation::apply_guard_rails(&config));

        Ok((config, warnings))
    }
}

fn settings_from_file(file: FileFederationConfig) -> FederationSettings {
    let defaults = FederationPolicy::default();
    FederationSettings {
        policy: FederationPolicy {
            enable_federation: file
                .enable_federation
                .unwrap_or(defaults.enable_federation),
            client_mode: file.client_mode.unwrap_or(defaults.client_mode),
            server_mode: file.server_mode.unwrap_or(defaults.server_mode),
            require_https: file.require_https.unwrap_or(defaults.require_https),
            admin_only_changes: file
                .admin_only_changes
                .unwrap_or(defaults.admin_only_changes),
        },
        peers: file.peers,
    }
}

fn apply_policy_overrides(policy: &mut FederationPolicy, env: &EnvConfig) {
    if let Some(value) = env.enable_federation {
        policy.enable_federation = value;
    }
    if let Some(value) = env.client_mode {
        policy.client_mode = value;
    }
    if let Some(value) = env.require_https {
        policy.require_https = value;
    }
}

fn compose_merge(
    file: FileMergeConfig,
    env: &EnvConfig,
) -> Result<MergeSettings, ConfigLoadError> {
    let defaults = MergeSettings::default();

    let peer_timeout = match env.peer_timeout.as_deref().or(file.peer_timeout.as_deref()) {
        Some(raw) => parse_duration("merge.peer_timeout", raw)?,
        None => defaults.peer_timeout,
    };
    let pass_deadline = match file.pass_deadline.as_deref() {
        Some(raw) => parse_duration("merge.pass_deadline", raw)?,
        None => defaults.pass_deadline,
    };
    let refresh_interval = env
        .refresh_interval
        .as_deref()
        .or(file.refresh_interval.as_deref())
        .map(|raw| parse_duration("merge.refresh_interval", raw))
        .transpose()?
        .filter(|interval| !interval.is_zero());

    let fetch_concurrency =
        file.fetch_concurrency.unwrap_or(defaults.fetch_concurrency);
    if fetch_concurrency == 0 {
        return Err(ConfigLoadError::InvalidValue {
            field: "merge.fetch_concurrency",
            reason: "must be at least 1".into(),
        });
    }
    if peer_timeout.is_zero() || pass_deadline.is_zero() {
        return Err(ConfigLoadError::InvalidValue {
            field: "merge",
            reason: "timeouts must be greater than zero".into(),
        });
    }

    Ok(MergeSettings {
        peer_timeout,
        fetch_concurrency,
        pass_deadline,
        refresh_interval,
    })
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error(transparent)]
    Env(#[from] dotenvy::Error),
}

impl ConfigLoadError {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigLoadError::MissingConfig { path }
            | ConfigLoadError::Io { path, .. }
            | ConfigLoadError::Parse { path, .. } => Some(path),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}
