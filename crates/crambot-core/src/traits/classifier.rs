// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI intent classification trait.

use async_trait::async_trait;

use crate::error::CrambotError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{IntentResult, ParentChild, Persona, TenantSnapshot};

/// Context handed to the classifier alongside the user's text.
#[derive(Debug, Clone)]
pub struct ClassifierContext {
    pub persona: Persona,
    pub tenant_name: String,
    /// Reference data for the admin persona.
    pub snapshot: Option<TenantSnapshot>,
    /// Children of the parent persona.
    pub children: Vec<ParentChild>,
}

/// Turns free text into a structured intent.
#[async_trait]
pub trait IntentClassifier: PluginAdapter {
    async fn classify(
        &self,
        text: &str,
        context: &ClassifierContext,
    ) -> Result<IntentResult, CrambotError>;
}
