// Copyright (c) Microsoft. All rights reserved.

#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use anyhow::Context;
use clap::Parser;

mod get_key;
mod settings;
mod x509;

#[derive(clap::Parser)]
#[command(about = "Retrieve keys from a QKD KME and issue certificates derived from them")]
struct Options {
    #[command(flatten)]
    global: settings::GlobalOptions,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Retrieve one key from the KME.
    GetKey(get_key::Options),

    /// Derive a key pair from a KME key and issue a self-signed certificate for it.
    X509(x509::Options),
}

fn main() {
    let options = Options::parse();

    let settings = settings::Settings::load(&options.global)
        .map(|settings| settings.with_overrides(&options.global));

    let debug = match &settings {
        Ok(settings) => settings.debug,
        Err(_) => options.global.debug,
    };
    if let Err(err) = logger::try_init(debug) {
        eprintln!("could not initialize logger: {}", err);
    }

    let result = settings
        .context("could not load configuration")
        .and_then(|settings| run(&options, &settings));

    if let Err(err) = result {
        log::error!("{}", err);
        for cause in err.chain().skip(1) {
            log::error!("caused by: {}", cause);
        }
        if let Some(category) = category(&err) {
            log::error!("error category: {}", category);
        }

        std::process::exit(1);
    }
}

fn run(options: &Options, settings: &settings::Settings) -> anyhow::Result<()> {
    let config = settings
        .endpoint_config(options.global.key_id.as_deref())
        .context("invalid KME settings")?;
    let client = kme_client::Client::new(config);

    match &options.command {
        Command::GetKey(command_options) => get_key::run(command_options, &client),
        Command::X509(command_options) => x509::run(command_options, &settings.x509, &client),
    }
}

/// The category of the first error in the chain that has one.
fn category(err: &anyhow::Error) -> Option<kme_common::ErrorCategory> {
    err.chain().find_map(|cause| {
        if let Some(err) = cause.downcast_ref::<qkd_certgen::IssuanceError>() {
            Some(err.category())
        } else if let Some(err) = cause.downcast_ref::<kme_client::RetrievalError>() {
            Some(err.category())
        } else if cause.is::<kme_common::ConfigError>()
            || cause.is::<config_common::error::Error>()
        {
            Some(kme_common::ErrorCategory::Configuration)
        } else {
            None
        }
    })
}
