// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The authenticated identity behind a request.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity principal attached to every scheduler operation.
///
/// The authentication layer is an external collaborator; the core only
/// needs the identity string for ownership/rate-limit keys and the admin
/// flag for cross-owner access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub admin: bool,
}

impl Principal {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            admin: false,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            admin: true,
        }
    }

    /// Whether this principal may operate on a task created by `owner`.
    pub fn can_access(&self, owner: &str) -> bool {
        self.admin || self.id == owner
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
