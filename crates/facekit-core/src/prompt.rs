//! Overwrite confirmation for runs that write into an existing output folder.

use dialoguer::Input;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("overwrite prompt failed: {0}")]
pub struct PromptError(pub String);

/// What to do when an output file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteDecision {
    /// Ask the [`OverwritePrompt`] for each existing file.
    Ask,
    /// Overwrite this file.
    Yes,
    /// Keep this file.
    No,
    /// Overwrite this and every later file without asking.
    AllRemaining,
}

impl OverwriteDecision {
    /// Parse a prompt answer: `y`, `n` or `all`, ignoring case and surrounding whitespace.
    pub fn parse_answer(input: &str) -> Option<Self> {
        let answer = input.trim();
        if answer.eq_ignore_ascii_case("y") {
            Some(Self::Yes)
        } else if answer.eq_ignore_ascii_case("n") {
            Some(Self::No)
        } else if answer.eq_ignore_ascii_case("all") {
            Some(Self::AllRemaining)
        } else {
            None
        }
    }
}

/// Source of overwrite answers when the policy is [`OverwriteDecision::Ask`].
pub trait OverwritePrompt {
    /// Ask whether `file_name` may be overwritten.
    ///
    /// Must return `Yes`, `No` or `AllRemaining`; returning `Ask` is treated as `No`.
    fn confirm(&mut self, file_name: &str) -> Result<OverwriteDecision, PromptError>;
}

/// Prompt for runs that never need to ask.
pub struct NoPrompt;

impl OverwritePrompt for NoPrompt {
    fn confirm(&mut self, _file_name: &str) -> Result<OverwriteDecision, PromptError> {
        Ok(OverwriteDecision::No)
    }
}

/// Line-oriented terminal prompt. Re-asks until the answer is `y`, `n` or `all`.
///
/// This is the interactive [`OverwritePrompt`] for
/// [`BatchRecognizer::position_folder`](crate::BatchRecognizer::position_folder)
/// under an [`OverwriteDecision::Ask`] policy.
pub struct TerminalPrompt;

impl OverwritePrompt for TerminalPrompt {
    fn confirm(&mut self, file_name: &str) -> Result<OverwriteDecision, PromptError> {
        let answer: String = Input::new()
            .with_prompt(format!("{file_name} already exists, overwrite it? (y/n/all)"))
            .validate_with(|input: &String| -> Result<(), &'static str> {
                OverwriteDecision::parse_answer(input)
                    .map(|_| ())
                    .ok_or("please answer y, n or all")
            })
            .interact_text()
            .map_err(|e| PromptError(e.to_string()))?;
        OverwriteDecision::parse_answer(&answer)
            .ok_or_else(|| PromptError(format!("unrecognised answer {answer:?}")))
    }
}

/// Per-run overwrite state. `AllRemaining` sticks once chosen.
pub struct OverwritePolicy<P> {
    decision: OverwriteDecision,
    prompt: P,
}

impl<P: OverwritePrompt> OverwritePolicy<P> {
    pub fn new(decision: OverwriteDecision, prompt: P) -> Self {
        Self { decision, prompt }
    }

    pub fn decision(&self) -> OverwriteDecision {
        self.decision
    }

    /// Whether an existing output named `file_name` should be replaced.
    pub fn should_overwrite(&mut self, file_name: &str) -> Result<bool, PromptError> {
        match self.decision {
            OverwriteDecision::Yes | OverwriteDecision::AllRemaining => Ok(true),
            OverwriteDecision::No => Ok(false),
            OverwriteDecision::Ask => match self.prompt.confirm(file_name)? {
                OverwriteDecision::Yes => Ok(true),
                OverwriteDecision::AllRemaining => {
                    self.decision = OverwriteDecision::AllRemaining;
                    Ok(true)
                }
                OverwriteDecision::No | OverwriteDecision::Ask => Ok(false),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedPrompt;

    #[test]
    fn test_parse_answer() {
        assert_eq!(OverwriteDecision::parse_answer("Y"), Some(OverwriteDecision::Yes));
        assert_eq!(OverwriteDecision::parse_answer(" n "), Some(OverwriteDecision::No));
        assert_eq!(OverwriteDecision::parse_answer("ALL"), Some(OverwriteDecision::AllRemaining));
        assert_eq!(OverwriteDecision::parse_answer("yes"), None);
        assert_eq!(OverwriteDecision::parse_answer(""), None);
    }

    #[test]
    fn test_policy_all_remaining_sticks() {
        let mut prompt = ScriptedPrompt::new(&[OverwriteDecision::No, OverwriteDecision::AllRemaining]);
        let mut policy = OverwritePolicy::new(OverwriteDecision::Ask, &mut prompt);
        assert!(!policy.should_overwrite("a.jpg").unwrap());
        assert!(policy.should_overwrite("b.jpg").unwrap());
        assert!(policy.should_overwrite("c.jpg").unwrap());
        assert_eq!(policy.decision(), OverwriteDecision::AllRemaining);
        drop(policy);
        assert_eq!(prompt.asked, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_policy_fixed_decisions_never_ask() {
        let mut prompt = ScriptedPrompt::new(&[]);
        assert!(OverwritePolicy::new(OverwriteDecision::Yes, &mut prompt).should_overwrite("a").unwrap());
        assert!(!OverwritePolicy::new(OverwriteDecision::No, &mut prompt).should_overwrite("a").unwrap());
        assert!(prompt.asked.is_empty());
    }
}
