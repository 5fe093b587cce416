//! Shell completions command

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io::{self, Write};

pub fn completions(shell: Shell) {
    write_completions(shell, &mut io::stdout());
}

fn write_completions<W: Write>(shell: Shell, out: &mut W) {
    let mut cmd = crate::Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_completions_cover_subcommands() {
        let mut out = Vec::new();
        write_completions(Shell::Bash, &mut out);
        let script = String::from_utf8(out).unwrap();

        assert!(script.contains("fifokit"));
        for sub in ["create", "listen", "send", "info"] {
            assert!(script.contains(sub), "missing {sub}");
        }
    }
}
