//! Operator prompts.
//!
//! Every interactive question goes through [`Prompt`], so flows can be driven
//! by a terminal in production and by a script in tests.

use std::io::{self, BufRead, Write};

/// Asks the operator questions. Each question carries a default answer.
pub trait Prompt {
    /// Yes/no question.
    fn confirm(&self, question: &str, default: bool) -> io::Result<bool>;

    /// Free-text question. An empty answer means the default.
    fn input(&self, question: &str, default: &str) -> io::Result<String>;
}

/// Prompts on stderr, reads answers from stdin.
///
/// With `assume_defaults`, every question is answered with its default
/// without reading input.
pub struct TerminalPrompt {
    assume_defaults: bool,
}

impl TerminalPrompt {
    pub fn new(assume_defaults: bool) -> Self {
        Self { assume_defaults }
    }

    fn ask(&self, question: &str, hint: &str) -> io::Result<Option<String>> {
        if self.assume_defaults {
            eprintln!("{question} {hint} (default)");
            return Ok(None);
        }

        let mut stderr = io::stderr().lock();
        write!(stderr, "{question} {hint} ")?;
        stderr.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            // EOF: nobody is there to answer.
            return Ok(None);
        }
        let answer = line.trim();
        Ok((!answer.is_empty()).then(|| answer.to_string()))
    }
}

impl Prompt for TerminalPrompt {
    fn confirm(&self, question: &str, default: bool) -> io::Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let Some(answer) = self.ask(question, hint)? else {
                return Ok(default);
            };
            match parse_yes_no(&answer) {
                Some(yes) => return Ok(yes),
                None => eprintln!("Please answer y or n."),
            }
        }
    }

    fn input(&self, question: &str, default: &str) -> io::Result<String> {
        let hint = if default.is_empty() {
            String::new()
        } else {
            format!("({default})")
        };
        Ok(self
            .ask(question, &hint)?
            .unwrap_or_else(|| default.to_string()))
    }
}

fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
pub use scripted::{Answer, ScriptedPrompt};
