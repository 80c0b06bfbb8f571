// SPDX-FileCopyrightText: 2026 vqos authors
// SPDX-License-Identifier: GPL-2.0-only

use uuid::Uuid;

/// Per-operation request context, threaded through the synchronization
/// operations and the notifier for log correlation. Carries no
/// authorization state; it never travels on the wire.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    /// Correlation id for this operation, if one was assigned.
    pub request_id: Option<String>,
}

impl RequestContext {
    /// A context with a freshly generated correlation id.
    pub fn new() -> Self {
        Self {
            request_id: Some(Uuid::new_v4().to_string()),
        }
    }
}
