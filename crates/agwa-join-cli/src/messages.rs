use agwa_join_core::Messenger;
use colored::*;

/// Prints tool messages to stdout, separate from the tracing output.
pub struct CliMessenger {
    debug: bool,
}

impl CliMessenger {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl Messenger for CliMessenger {
    fn message(&self, text: &str) {
        println!("{}", text);
    }

    fn warning(&self, text: &str) {
        println!("{}", text.yellow());
    }

    fn debug(&self, text: &str) {
        if self.debug {
            println!("{}", text.dimmed());
        }
    }
}
