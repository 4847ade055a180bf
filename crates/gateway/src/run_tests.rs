use clap::Parser;

use super::*;

#[test]
fn init_tracing_is_idempotent() {
    let config = Config::parse_from(["tnc-gateway"]);
    init_tracing(&config);
    init_tracing(&config);
}
