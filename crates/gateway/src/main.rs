// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use tncgw::config::Config;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if config.version {
        println!("tnc-gateway {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    if config.assets {
        let dir = match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        };
        match tncgw::assets::write_to(&dir) {
            Ok(paths) => {
                for path in paths {
                    println!("{}", path.display());
                }
            }
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    if let Err(e) = tncgw::run::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
