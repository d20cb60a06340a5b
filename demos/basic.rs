//! Basic example: reasons, dispatchers and modes.
//!
//! Registers a second dispatcher next to the terminal one, reports a few
//! things, and shows how the mode decides what each dispatcher displays.

use report_dispatch::{
    info, mistake, notice, trace, warning, DispatcherOptions, Mode, ReasonFormat, ReportingContext,
    SinkKind, Targets, __nx, __x,
};

fn main() {
    let ctx = ReportingContext::global();

    // Everything from INFO up, with the reason label in capitals
    ctx.register(
        SinkKind::callback(|record| {
            print!("[{}] {}", record.dispatcher.name(), record.render());
            Ok(())
        }),
        "audit",
        DispatcherOptions::new()
            .mode(Mode::Verbose)
            .format_reason(ReasonFormat::Uppercase),
    )
    .ok();

    println!("=== Basic Reporting Example ===\n");

    trace("nobody needs this one");
    info(__x("configuration loaded from {file}").arg("file", "app.toml"));
    notice(__nx("one file to process", "{_count} files to process", 3));
    warning("disk almost full");
    mistake(__x("unknown option {opt}").arg("opt", "--colour"));

    println!("\nSwitching every dispatcher to DEBUG mode:\n");
    ctx.set_mode(Mode::Debug, Targets::All);
    trace("now the trace is shown");
    warning("and warnings carry their location");

    for dispatcher in ctx.list() {
        println!(
            "dispatcher {} ({}) in {} mode",
            dispatcher.name(),
            dispatcher.kind(),
            dispatcher.mode()
        );
    }
}
