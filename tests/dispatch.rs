use report_dispatch::infrastructure::mocks::{MockSink, MockTerminator, MockTranslator};
use report_dispatch::{
    expand_reasons, DispatcherOptions, Message, Reason, ReasonError, ReasonSet, ReportOptions,
    ReportingContext, SinkKind, __,
};
use std::sync::Arc;

fn bare_context() -> ReportingContext {
    ReportingContext::builder()
        .without_default_dispatcher()
        .build()
}

fn attach(ctx: &ReportingContext, name: &str, accept: &str) -> Arc<MockSink> {
    let sink = Arc::new(MockSink::new());
    ctx.register(
        SinkKind::Custom(sink.clone()),
        name,
        DispatcherOptions::new().accept(accept),
    )
    .unwrap();
    sink
}

#[test]
fn test_reason_expressions() {
    assert_eq!(expand_reasons("ERROR").unwrap(), ReasonSet::from(Reason::Error));
    assert_eq!(
        expand_reasons("NOTICE-MISTAKE").unwrap(),
        ReasonSet::range(Reason::Notice, Reason::Mistake)
    );
    assert_eq!(expand_reasons("NOTICE-MISTAKE").unwrap().len(), 3);
    assert!(matches!(
        expand_reasons("ERROR-INFO"),
        Err(ReasonError::InvalidRange { .. })
    ));
    assert!(expand_reasons("NOTICE-NOTICE").is_err());
}

#[test]
fn test_reregistering_replaces_dispatcher() {
    let ctx = bare_context();
    let first = attach(&ctx, "log", "INFO");
    let second = attach(&ctx, "log", "ERROR");

    assert_eq!(ctx.list().len(), 1);
    assert!(ctx.needs_list(Reason::Info).is_empty());
    assert_eq!(ctx.needs_list(Reason::Error), vec!["log".to_string()]);
    assert_eq!(first.close_count(), 1);

    ctx.report(ReportOptions::new().fatal(false), Reason::Error, "disk full")
        .unwrap();
    assert_eq!(first.count(), 0);
    assert_eq!(second.count(), 1);
}

#[test]
fn test_unneeded_report_touches_no_sink() {
    let ctx = bare_context();
    let sink = attach(&ctx, "log", "WARNING-");
    let translator = Arc::new(MockTranslator::new());
    ctx.domains().set_default_translator(Some(translator.clone()));

    let delivered = ctx
        .report(ReportOptions::new(), Reason::Info, __("not interesting"))
        .unwrap();

    assert!(delivered.is_lost());
    assert_eq!(sink.count(), 0);
    assert_eq!(translator.lookups(), 0);
}

#[test]
fn test_each_dispatcher_renders_in_its_locale() {
    let ctx = bare_context();
    ctx.domains().set_default_translator(Some(Arc::new(
        MockTranslator::new().with("nl", "disk full", "schijf vol"),
    )));
    let english = attach(&ctx, "english", "ALL");
    let dutch = Arc::new(MockSink::new());
    ctx.register(
        SinkKind::Custom(dutch.clone()),
        "dutch",
        DispatcherOptions::new().accept("ALL").locale("nl"),
    )
    .unwrap();

    ctx.report(ReportOptions::new(), Reason::Warning, __("disk full"))
        .unwrap();

    assert_eq!(english.records()[0].message, "disk full");
    assert_eq!(dutch.records()[0].message, "schijf vol");
    assert_eq!(english.records()[0].report_id, dutch.records()[0].report_id);
}

#[test]
fn test_uncaught_fault_terminates_with_errno() {
    let terminator = Arc::new(MockTerminator::new());
    let ctx = ReportingContext::builder()
        .without_default_dispatcher()
        .with_fatal_exit(true)
        .with_terminator(terminator.clone())
        .build();
    let sink = attach(&ctx, "log", "ALL");

    let exception = ctx
        .report(
            ReportOptions::new().errno(3),
            Reason::Fault,
            Message::literal("cannot open config"),
        )
        .unwrap_err();

    assert_eq!(exception.exit_code(), 3);
    assert_eq!(exception.errno(), Some(3));
    assert_eq!(terminator.codes(), vec![3]);
    assert_eq!(sink.count(), 1);
}

#[test]
fn test_fatal_inside_try_does_not_terminate() {
    let terminator = Arc::new(MockTerminator::new());
    let ctx = ReportingContext::builder()
        .without_default_dispatcher()
        .with_fatal_exit(true)
        .with_terminator(terminator.clone())
        .build();

    let result = ctx.try_scope(|scope| {
        scope.report(ReportOptions::new().errno(3), Reason::Fault, "gone")?;
        Ok(())
    });

    assert!(result.failed());
    assert!(terminator.codes().is_empty());
}

#[test]
fn test_closed_dispatchers_receive_nothing() {
    let ctx = bare_context();
    let sink = attach(&ctx, "log", "ALL");

    assert_eq!(ctx.close("log"), 1);
    ctx.report(ReportOptions::new(), Reason::Warning, "after close")
        .unwrap();

    assert_eq!(sink.count(), 0);
    assert_eq!(sink.close_count(), 1);
    assert!(ctx.find("log").is_none());
}
