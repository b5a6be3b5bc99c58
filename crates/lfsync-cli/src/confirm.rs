// Copyright (C) 2026  lfsync Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Interactive confirmation for destructive recovery.

use async_trait::async_trait;
use console::Term;
use dialoguer::Confirm;
use lfsync_sync::Confirmer;
use tracing::warn;

/// Asks on the terminal; declines when stdin or stderr is not a terminal.
///
/// The prompt runs on the blocking pool so Ctrl-C is still handled while
/// it waits for input.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptConfirmer;

#[async_trait]
impl Confirmer for PromptConfirmer {
    async fn confirm(&self, prompt: &str) -> bool {
        if !Term::stderr().is_term() || !console::user_attended() {
            warn!("Not running interactively, declining: {}", prompt);
            return false;
        }
        let prompt = prompt.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact()
                .unwrap_or(false)
        })
        .await;
        answer.unwrap_or(false)
    }
}
