// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The gRPC transport surface: one `tonic` service implementation per
//! `.proto` service, all sharing the same [`crate::state::Store`].

pub mod grpc;
