//! Console confirmation prompts.
//!
//! Any I/O failure while prompting counts as "no". Nothing destructive is
//! sent unless the operator explicitly typed yes.

use std::io::{self, BufRead, Write};

use cardlock_core::{Operator, UnlockPrompt};

pub struct ConsoleOperator<R, W> {
    input: R,
    output: W,
}

impl ConsoleOperator<io::StdinLock<'static>, io::Stderr> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Shown once, before any port is opened.
    pub fn confirm_disclaimer(&mut self) -> io::Result<bool> {
        writeln!(
            self.output,
            "\nThis program tries to remove the SIM lock on Huawei modems.\n\
             It may damage the modem. A modem that receives too many wrong\n\
             unlock codes locks itself permanently. Use it at your own risk."
        )?;
        self.ask("Do you want to continue?")
    }

    fn ask(&mut self, question: &str) -> io::Result<bool> {
        write!(self.output, "{question} [y/N] ")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        Ok(is_yes(&line))
    }
}

impl<R: BufRead, W: Write> Operator for ConsoleOperator<R, W> {
    fn confirm_unlock(&mut self, prompt: &UnlockPrompt) -> bool {
        let shown = writeln!(
            self.output,
            "\nModem on {} (IMEI {}) can be unlocked.\n\
             Remaining unlock attempts: {}\n\
             Each failed attempt uses one up; at zero the modem is hard locked for good.\n\
             Code to send: {}",
            prompt.endpoint, prompt.imei, prompt.remaining_attempts, prompt.code
        );
        if shown.is_err() {
            return false;
        }
        self.ask("Send the unlock code now?").unwrap_or(false)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
