// Copyright (c) Microsoft. All rights reserved.

use anyhow::Context;

const DEFAULT_DAYS: u32 = 365;

#[derive(clap::Args)]
pub(crate) struct Options {
    /// Certificate subject, eg /C=RO/O=InnoQube/CN=quantum-app-1
    #[arg(long)]
    pub(crate) subject: Option<String>,

    /// Certificate validity in days [default: 365]
    #[arg(long)]
    pub(crate) days: Option<u32>,

    /// Write <PREFIX>-privatekey.pem and <PREFIX>-certificate.pem
    #[arg(long, conflicts_with = "stdout")]
    pub(crate) prefix: Option<std::path::PathBuf>,

    /// Print the private key and certificate instead of writing files
    #[arg(long)]
    pub(crate) stdout: bool,
}

pub(crate) fn run(
    options: &Options,
    settings: &crate::settings::X509Settings,
    client: &kme_client::Client,
) -> anyhow::Result<()> {
    let output = output(options, settings)?;
    let days = options.days.or(settings.days).unwrap_or(DEFAULT_DAYS);
    let subject = options
        .subject
        .as_deref()
        .or(settings.subject.as_deref())
        .map(qkd_certgen::dn::parse);

    let issued = qkd_certgen::issue_certificate(client, subject.as_ref(), days)
        .context("could not issue certificate")?;
    log::info!("certificate derived from KME key ID {}", issued.key_id);

    let identity = qkd_certgen::pem::encode(&issued.identity)
        .context("could not encode certificate as PEM")?;
    output
        .write(&identity)
        .context("could not write certificate")?;

    Ok(())
}

/// Flags take precedence over the config file, and `--stdout` over a configured prefix.
fn output(
    options: &Options,
    settings: &crate::settings::X509Settings,
) -> anyhow::Result<qkd_certgen::pem::Output> {
    if options.stdout {
        return Ok(qkd_certgen::pem::Output::Stdout);
    }

    if let Some(prefix) = &options.prefix {
        if prefix.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("--prefix must not be empty"));
        }

        return Ok(qkd_certgen::pem::Output::Files {
            prefix: prefix.clone(),
        });
    }

    if settings.stdout {
        return Ok(qkd_certgen::pem::Output::Stdout);
    }

    match &settings.prefix {
        Some(prefix) if !prefix.as_os_str().is_empty() => Ok(qkd_certgen::pem::Output::Files {
            prefix: prefix.clone(),
        }),
        _ => Err(anyhow::anyhow!(
            "a certificate file prefix or --stdout must be provided"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{output, Options};
    use crate::settings::X509Settings;
    use qkd_certgen::pem::Output;

    fn options(prefix: Option<&str>, stdout: bool) -> Options {
        Options {
            subject: None,
            days: None,
            prefix: prefix.map(Into::into),
            stdout,
        }
    }

    #[test]
    fn flags_take_precedence() {
        let settings = X509Settings {
            prefix: Some("from-file".into()),
            ..Default::default()
        };

        assert_eq!(
            output(&options(Some("from-flag"), false), &settings).unwrap(),
            Output::Files {
                prefix: "from-flag".into()
            }
        );
        assert_eq!(
            output(&options(None, true), &settings).unwrap(),
            Output::Stdout
        );
        assert_eq!(
            output(&options(None, false), &settings).unwrap(),
            Output::Files {
                prefix: "from-file".into()
            }
        );
    }

    #[test]
    fn configured_stdout() {
        let settings = X509Settings {
            stdout: true,
            ..Default::default()
        };
        assert_eq!(
            output(&options(None, false), &settings).unwrap(),
            Output::Stdout
        );
    }

    #[test]
    fn output_is_required() {
        assert!(output(&options(None, false), &X509Settings::default()).is_err());

        let settings = X509Settings {
            prefix: Some("".into()),
            ..Default::default()
        };
        assert!(output(&options(None, false), &settings).is_err());
    }

    #[test]
    fn empty_prefix_flag_is_rejected() {
        let settings = X509Settings {
            prefix: Some("from-file".into()),
            ..Default::default()
        };
        let err = output(&options(Some(""), false), &settings).unwrap_err();
        assert!(err.to_string().contains("--prefix"), "{err}");

        assert!(output(&options(Some(""), false), &X509Settings::default()).is_err());
    }
}
