// Copyright (c) Microsoft. All rights reserved.

use std::path::{Path, PathBuf};

const CONFIG_PATH_ENV_VAR: &str = "QKD_CONFIG";
const CONFIG_DIRECTORY_PATH_ENV_VAR: &str = "QKD_CONFIG_DIR";

const DEFAULT_CONFIG_PATH: &str = "/etc/qkd/config.toml";
const DEFAULT_CONFIG_DIRECTORY_PATH: &str = "/etc/qkd/config.d";

/// Settings that apply to every subcommand. Each one overrides the corresponding config file value.
#[derive(Debug, Default, clap::Args)]
pub(crate) struct GlobalOptions {
    /// Config file. Defaults to $QKD_CONFIG, then /etc/qkd/config.toml
    #[arg(long, global = true, value_name = "FILE")]
    pub(crate) config: Option<PathBuf>,

    /// PEM file with the client certificate presented to the KME
    #[arg(long, global = true, value_name = "FILE")]
    pub(crate) certificate: Option<PathBuf>,

    /// PEM file with the private key of the client certificate
    #[arg(long, global = true, value_name = "FILE")]
    pub(crate) private_key: Option<PathBuf>,

    /// Base URL of the KME, eg https://kme.example/
    #[arg(long = "kme", global = true, value_name = "URL")]
    pub(crate) kme_url: Option<String>,

    /// Identifier of the peer SAE
    #[arg(long, global = true)]
    pub(crate) sae: Option<String>,

    /// Request this previously issued key instead of a fresh one
    #[arg(long, global = true)]
    pub(crate) key_id: Option<String>,

    /// Additional CA certificates to trust for the KME server certificate
    #[arg(long, global = true, value_name = "FILE")]
    pub(crate) trust_bundle: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub(crate) timeout: Option<u64>,

    /// Log at debug level, including request details
    #[arg(long, global = true)]
    pub(crate) debug: bool,
}

/// Contents of the config file.
#[derive(Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub(crate) struct Settings {
    pub(crate) kme_url: Option<String>,
    pub(crate) sae: Option<String>,
    pub(crate) certificate: Option<PathBuf>,
    pub(crate) private_key: Option<PathBuf>,
    pub(crate) trust_bundle: Option<PathBuf>,
    pub(crate) timeout_secs: Option<u64>,

    #[serde(default)]
    pub(crate) debug: bool,

    #[serde(default)]
    pub(crate) x509: X509Settings,
}

#[derive(Debug, Default, PartialEq, Eq, serde::Deserialize)]
pub(crate) struct X509Settings {
    pub(crate) subject: Option<String>,
    pub(crate) days: Option<u32>,
    pub(crate) prefix: Option<PathBuf>,

    #[serde(default)]
    pub(crate) stdout: bool,
}

impl Settings {
    /// Reads the config file and its drop-in directory.
    ///
    /// A config file named by `--config` or `$QKD_CONFIG` must exist. The default one is optional,
    /// so that everything can be passed as flags.
    pub(crate) fn load(options: &GlobalOptions) -> Result<Self, config_common::error::Error> {
        let config_directory_path = std::env::var_os(CONFIG_DIRECTORY_PATH_ENV_VAR)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIRECTORY_PATH), PathBuf::from);

        let explicit_config_path = options
            .config
            .clone()
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV_VAR).map(PathBuf::from));

        Settings::load_from(explicit_config_path.as_deref(), &config_directory_path)
    }

    fn load_from(
        explicit_config_path: Option<&Path>,
        config_directory_path: &Path,
    ) -> Result<Self, config_common::error::Error> {
        match explicit_config_path {
            Some(config_path) => {
                config_common::read_config(config_path, Some(config_directory_path))
            }
            None => config_common::read_config_if_exists(
                Path::new(DEFAULT_CONFIG_PATH),
                Some(config_directory_path),
            ),
        }
    }

    /// Applies command-line overrides.
    #[must_use]
    pub(crate) fn with_overrides(mut self, options: &GlobalOptions) -> Self {
        if let Some(kme_url) = &options.kme_url {
            self.kme_url = Some(kme_url.clone());
        }
        if let Some(sae) = &options.sae {
            self.sae = Some(sae.clone());
        }
        if let Some(certificate) = &options.certificate {
            self.certificate = Some(certificate.clone());
        }
        if let Some(private_key) = &options.private_key {
            self.private_key = Some(private_key.clone());
        }
        if let Some(trust_bundle) = &options.trust_bundle {
            self.trust_bundle = Some(trust_bundle.clone());
        }
        if let Some(timeout) = options.timeout {
            self.timeout_secs = Some(timeout);
        }
        self.debug |= options.debug;

        self
    }

    /// Resolves the settings into a validated endpoint configuration.
    pub(crate) fn endpoint_config(
        &self,
        key_id: Option<&str>,
    ) -> Result<kme_common::EndpointConfig, kme_common::ConfigError> {
        let credentials = kme_common::Credentials::Files {
            cert: self.certificate.clone().unwrap_or_default(),
            key: self.private_key.clone().unwrap_or_default(),
        };

        let mut config = kme_common::EndpointConfig::new(
            self.kme_url.as_deref().unwrap_or_default(),
            self.sae.as_deref().unwrap_or_default(),
            credentials,
            key_id,
        )?
        .with_debug(self.debug);

        if let Some(trust_bundle) = &self.trust_bundle {
            config = config.with_trust_bundle(trust_bundle.clone());
        }

        if let Some(timeout_secs) = self.timeout_secs {
            config = config.with_timeout(std::time::Duration::from_secs(timeout_secs))?;
        }

        Ok(config)
    }
}
