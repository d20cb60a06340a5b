use report_dispatch::infrastructure::mocks::MockSink;
use report_dispatch::{
    error, failure, notice, try_scope, DispatcherOptions, Exception, Reason, ReasonSet, ReportingContext,
    Rethrow, SinkKind, TryOptions,
};
use std::sync::Arc;

fn context_with_sink() -> (ReportingContext, Arc<MockSink>) {
    let ctx = ReportingContext::builder()
        .without_default_dispatcher()
        .build();
    let sink = Arc::new(MockSink::new());
    ctx.register(
        SinkKind::Custom(sink.clone()),
        "log",
        DispatcherOptions::new().accept("ALL"),
    )
    .unwrap();
    (ctx, sink)
}

#[test]
fn test_error_is_collected_not_shown() {
    let (ctx, sink) = context_with_sink();

    let result = ctx.try_scope(|_| error::<()>("cannot parse"));

    assert!(result.failed());
    assert_eq!(result.exceptions().len(), 1);
    assert_eq!(result.was_fatal(None).map(|e| e.reason()), Some(Reason::Error));
    assert_eq!(sink.count(), 0);
}

#[test]
fn test_nested_scopes_pass_exceptions_outwards() {
    let (ctx, sink) = context_with_sink();

    let outer = ctx.try_scope(|_| {
        let inner = try_scope(|_| failure::<()>("network down"));
        assert_eq!(inner.exceptions().len(), 1);
        inner.report_all(None)?;
        Ok(())
    });

    assert_eq!(sink.count(), 0);
    assert_eq!(outer.exceptions().len(), 1);
    assert_eq!(outer.exceptions()[0].reason(), Reason::Failure);

    assert!(outer.report_all(None).is_err());
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reason, Reason::Failure);
    assert_eq!(records[0].message, "network down");
}

#[test]
fn test_demoted_rethrow_is_not_fatal() {
    let (ctx, sink) = context_with_sink();

    let result = ctx.try_scope(|_| error::<u32>("bad input"));
    let demote = Rethrow::new().reason(Reason::Warning);
    assert!(result.report_fatal(Some(&demote)).is_ok());

    assert_eq!(sink.records()[0].reason, Reason::Warning);
    assert_eq!(sink.records()[0].message, "bad input");
}

#[test]
fn test_hidden_reasons_reach_outer_sinks() {
    let (ctx, sink) = context_with_sink();

    let options = TryOptions::new().hide(ReasonSet::from(Reason::Notice));
    let result = ctx.try_scope_with(options, |_| {
        notice("still visible");
        Ok(7)
    });

    assert!(result.success());
    assert_eq!(result.value(), Some(&7));
    assert!(result.exceptions().is_empty());
    assert_eq!(sink.texts(), vec!["notice: still visible\n".to_string()]);
}

#[test]
fn test_panics_become_fatal_exceptions() {
    let (ctx, sink) = context_with_sink();

    let result = ctx.try_scope(|_| -> Result<(), Exception> { panic!("index out of range") });

    let fatal = result.was_fatal(None).unwrap();
    assert_eq!(fatal.reason(), Reason::Error);
    assert!(fatal.is_fatal());
    assert!(fatal.message().render(None).contains("index out of range"));
    assert_eq!(sink.count(), 0);
}

#[test]
fn test_into_result_returns_value_or_exception() {
    let (ctx, _sink) = context_with_sink();

    let ok = ctx.try_scope(|_| Ok::<_, Exception>("done"));
    assert_eq!(ok.into_result().unwrap(), "done");

    let failed = ctx.try_scope(|_| error::<&str>("nope"));
    assert_eq!(failed.into_result().unwrap_err().reason(), Reason::Error);
}
