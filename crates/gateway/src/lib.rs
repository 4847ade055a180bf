// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod assets;
pub mod bridge;
pub mod bus;
pub mod codec;
pub mod config;
pub mod consensus;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod routing;
pub mod run;
pub mod state;
pub mod transport;

pub mod proto {
    pub mod tnc {
        pub mod v1 {
            tonic::include_proto!("tnc.v1");
        }
    }
}
