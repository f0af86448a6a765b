//! Interactive prompts

use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Select};

use common::error::Error;

/// Single-choice selection and yes/no confirmation
pub trait ChoicePrompt {
    /// Asks the user to pick one of `options` and returns its index
    fn select(&self, message: &str, options: &[String]) -> Result<usize>;

    /// Asks a yes/no question, defaulting to no
    fn confirm(&self, message: &str) -> Result<bool>;
}

/// [`ChoicePrompt`] on the controlling terminal
pub struct TerminalPrompt {
    theme: ColorfulTheme,
}

impl TerminalPrompt {
    /// Creates a new terminal prompt
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl ChoicePrompt for TerminalPrompt {
    fn select(&self, message: &str, options: &[String]) -> Result<usize> {
        if options.is_empty() {
            return Err(Error::InvalidArgument(format!("nothing to choose for '{}'", message)).into());
        }

        let index = Select::with_theme(&self.theme)
            .with_prompt(message)
            .items(options)
            .default(0)
            .interact()?;

        Ok(index)
    }

    fn confirm(&self, message: &str) -> Result<bool> {
        let answer = Confirm::with_theme(&self.theme)
            .with_prompt(message)
            .default(false)
            .interact()?;

        Ok(answer)
    }
}
