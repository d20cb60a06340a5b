//! Translation example.
//!
//! Messages stay untranslated until a dispatcher renders them, so two
//! dispatchers with different locales show the same report in their own
//! language.

use report_dispatch::{
    notice, warning, CatalogTranslator, DispatcherOptions, PluralRule, ReportingContext, SinkKind,
    __, __nx, __px, __x,
};
use std::sync::Arc;

fn main() {
    let catalog = CatalogTranslator::new()
        .with_entry("nl", "disk almost full", "schijf bijna vol")
        .with_plural("nl", "one file removed", ["één bestand verwijderd", "{_count} bestanden verwijderd"])
        .with_context("nl", "button", "{what} open", "{what} openen")
        .with_entry("nl", "WARNING", "waarschuwing")
        .with_entry("nl", "NOTICE", "mededeling")
        .with_rule("nl", PluralRule::OneOther);

    let ctx = ReportingContext::builder()
        .with_translator(Arc::new(catalog))
        .build();
    ctx.register(
        SinkKind::callback(|record| {
            print!("[nl] {}", record.render());
            Ok(())
        }),
        "dutch",
        DispatcherOptions::new().locale("nl_NL.UTF-8"),
    )
    .ok();

    println!("=== Translation Example ===\n");

    ctx.in_scope(|| {
        warning(__("disk almost full"));
        for removed in [1, 4] {
            notice(__nx("one file removed", "{_count} files removed", removed));
        }
        notice(__px("button", "{what} open").arg("what", "bestand"));
        notice(__x("{user} logged in").arg("user", "alice"));
    });
}
