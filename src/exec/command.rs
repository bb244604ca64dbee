// src/exec/command.rs

use std::fmt;

/// A fully resolved command line: program plus arguments, no shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Build from an argv list as found in the config (`cmd = [...]`).
    ///
    /// Returns `None` for an empty list.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, rest) = argv.split_first()?;
        Some(Self::new(program.clone()).args(rest.iter().cloned()))
    }

    pub(crate) fn to_tokio_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Renders the command the way it could be pasted into a POSIX shell.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_quote(&self.program))?;
        for arg in &self.args {
            f.write_str(" ")?;
            f.write_str(&shell_quote(arg))?;
        }
        Ok(())
    }
}

fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "_./:=@%+,-".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_only_when_needed() {
        let spec = CommandSpec::new("ssh")
            .args(["-L", "127.0.0.1:3307:localhost:3306"])
            .arg("echo it's done");
        assert_eq!(
            spec.to_string(),
            r"ssh -L 127.0.0.1:3307:localhost:3306 'echo it'\''s done'"
        );
    }

    #[test]
    fn empty_argument_is_visible() {
        assert_eq!(CommandSpec::new("printf").arg("").to_string(), "printf ''");
    }

    #[test]
    fn from_argv_splits_program() {
        let argv = vec!["sh".to_string(), "-c".to_string(), "true".to_string()];
        let spec = CommandSpec::from_argv(&argv).unwrap();
        assert_eq!(spec.program, "sh");
        assert_eq!(spec.args, vec!["-c", "true"]);
        assert!(CommandSpec::from_argv(&[]).is_none());
    }
}
