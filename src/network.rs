// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Livemode partition.
//!
//! Production and test traffic use disjoint trust anchors, verifier
//! allowlists and storage tables. The partition is always passed explicitly.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Network a request or record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Test network (livemode = false)
    Test,
    /// Production network (livemode = true)
    Live,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::Test, Network::Live];

    pub fn from_livemode(livemode: bool) -> Self {
        if livemode {
            Network::Live
        } else {
            Network::Test
        }
    }

    pub fn livemode(&self) -> bool {
        matches!(self, Network::Live)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Test => "test",
            Network::Live => "live",
        }
    }
}

impl Default for Network {
    /// Requests that do not ask for livemode stay on the test network.
    fn default() -> Self {
        Network::Test
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
