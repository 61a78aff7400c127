// Command Line Assembly

use serde::{Deserialize, Serialize};

/// Program plus ordered argument tokens
///
/// The rendered form is the program, a single space, then the tokens joined
/// by single spaces. Tokens are never re-split or quoted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from one pre-joined argument string (a one-element token list).
    /// An empty line yields no arguments.
    pub fn from_line(program: impl Into<String>, line: impl Into<String>) -> Self {
        let line = line.into();
        let args = if line.is_empty() { Vec::new() } else { vec![line] };
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Argument tokens joined by single spaces
    pub fn argument_line(&self) -> String {
        self.args.join(" ")
    }

    /// The full command line as a single string
    pub fn render(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.argument_line())
        }
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}
