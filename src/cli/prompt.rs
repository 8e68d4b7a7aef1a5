//! Terminal prompts answering workflow approvals.

use crate::approval::ApprovalProvider;
use crate::error::{ReleaseError, Result, WorkflowError};
use dialoguer::{Confirm, Editor, Input, Select};
use std::io::ErrorKind;

/// Asks the operator on the controlling terminal
#[derive(Debug, Default)]
pub struct TerminalApproval;

fn prompt_error(error: dialoguer::Error) -> ReleaseError {
    let dialoguer::Error::IO(io) = error;
    if io.kind() == ErrorKind::Interrupted {
        WorkflowError::Interrupted.into()
    } else {
        io.into()
    }
}

impl ApprovalProvider for TerminalApproval {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .interact()
            .map_err(prompt_error)
    }

    fn choose(&self, prompt: &str, options: &[&str]) -> Result<usize> {
        Select::new()
            .with_prompt(prompt)
            .items(options)
            .default(0)
            .interact()
            .map_err(prompt_error)
    }

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::new().with_prompt(prompt);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        input.interact_text().map_err(prompt_error)
    }

    fn edit(&self, text: &str) -> Result<String> {
        let edited = Editor::new()
            .extension(".md")
            .edit(text)
            .map_err(prompt_error)?;
        // closing the editor without saving keeps the text
        Ok(edited.unwrap_or_else(|| text.to_string()))
    }
}
