// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Writes the gateway's `.proto` definitions to the current directory, so
//! client authors don't need to vendor them from anywhere else.

use std::path::Path;

const PROTO_FILES: &[(&str, &str)] = &[
    ("common.proto", include_str!("../../../proto/tnc/v1/common.proto")),
    ("routing.proto", include_str!("../../../proto/tnc/v1/routing.proto")),
    ("communication.proto", include_str!("../../../proto/tnc/v1/communication.proto")),
    ("lifecycle.proto", include_str!("../../../proto/tnc/v1/lifecycle.proto")),
    ("consensus.proto", include_str!("../../../proto/tnc/v1/consensus.proto")),
];

/// Write every proto asset into `dir`, creating it if necessary.
pub fn write_to(dir: &Path) -> anyhow::Result<Vec<std::path::PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(PROTO_FILES.len());
    for (name, contents) in PROTO_FILES {
        let path = dir.join(name);
        std::fs::write(&path, contents)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_every_proto_file() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_to(dir.path()).unwrap();
        assert_eq!(written.len(), PROTO_FILES.len());
        for (name, contents) in PROTO_FILES {
            let on_disk = std::fs::read_to_string(dir.path().join(name)).unwrap();
            assert_eq!(&on_disk, contents);
        }
    }
}
