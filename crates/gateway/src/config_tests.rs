// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;

fn parse(args: &[&str]) -> Config {
    let mut full = vec!["tnc-gateway"];
    full.extend_from_slice(args);
    Config::parse_from(full)
}

#[test]
fn defaults_are_valid() {
    let cfg = parse(&[]);
    assert_eq!(cfg.grpc_port, 50060);
    assert_eq!(cfg.namespace, "tnc");
    assert!(cfg.validate().is_ok());
    assert!(!cfg.bus_autostart());
}

#[test]
fn bus_url_enables_autostart() {
    let cfg = parse(&["--bus-url", "mqtt://localhost:1883"]);
    assert!(cfg.bus_autostart());
}

#[test]
fn rejects_bad_log_format() {
    let cfg = parse(&["--log-format", "xml"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_zero_grpc_port() {
    let cfg = parse(&["--grpc-port", "0"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn agent_id_defaults_to_fresh_uuid_each_call() {
    let cfg = parse(&[]);
    assert_ne!(cfg.effective_agent_id(), cfg.effective_agent_id());
}

#[test]
fn explicit_agent_id_is_stable() {
    let id = Uuid::new_v4();
    let cfg = parse(&["--agent-id", &id.to_string()]);
    assert_eq!(cfg.effective_agent_id(), id);
    assert_eq!(cfg.effective_agent_id(), id);
}
