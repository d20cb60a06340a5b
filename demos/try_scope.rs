//! Try scope example.
//!
//! Work inside a try scope is not shown right away: the caller looks at
//! what was collected and decides to retry, demote or pass it on.

use report_dispatch::{
    error, fault, notice, run_main, try_scope, Exception, Reason, Rethrow, __x,
};
use std::process::ExitCode;

fn parse_port(text: &str) -> Result<u16, Exception> {
    notice(__x("parsing port {text}").arg("text", text));
    text.parse()
        .or_else(|_| error(__x("not a port number: {text}").arg("text", text).tag("config")))
}

fn main() -> ExitCode {
    run_main(|| {
        println!("=== Try Scope Example ===\n");

        let attempt = try_scope(|_| parse_port("eighty"));
        if let Some(status) = attempt.show_status() {
            println!("{}", status);
        }
        if attempt.was_fatal(Some("config")).is_some() {
            println!("configuration problem, reporting it as a warning\n");
            attempt.report_fatal(Some(&Rethrow::new().reason(Reason::Warning)))?;
        }

        let port = try_scope(|_| parse_port("8080")).into_result()?;
        println!("using port {}\n", port);

        let nested = try_scope(|_| {
            let inner = try_scope(|_| fault::<()>("cannot open socket"));
            inner.report_all(None)?;
            Ok(())
        });
        println!("outer scope collected {} exception(s)", nested.exceptions().len());

        // Uncaught: shown on the terminal and turned into the exit code
        nested.report_all(None)
    })
}
