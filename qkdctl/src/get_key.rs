// Copyright (c) Microsoft. All rights reserved.

use anyhow::Context;

#[derive(clap::Args)]
pub(crate) struct Options {
    /// Print only `<key ID>:<key>` to stdout
    #[arg(long, short)]
    quiet: bool,
}

pub(crate) fn run(options: &Options, client: &kme_client::Client) -> anyhow::Result<()> {
    let key = client.retrieve().context("could not retrieve key")?;

    if options.quiet {
        println!("{}:{}", key.key_id, key.key);
    } else {
        log::info!("key ID: {}", key.key_id);
        log::info!("key: {}", key.key);
    }

    Ok(())
}
