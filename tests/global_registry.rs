// The process-wide registry accepts extensions until the first suite starts.
// Kept in its own test binary: sealing is global state.

use bramble::config::RunConfig;
use bramble::report::{NullReporter, RecordingReporter, TestOutcome};
use bramble::{
    global_registry, register_operator, AssertionInvocation, AssertionOperator, BrambleError,
    SuiteDefinition, SuiteRunner, Value,
};

#[test]
fn extensions_register_before_the_first_suite_only() {
    register_operator(
        AssertionOperator::new("BeEven", |actual, _| {
            actual.as_number().map_or(false, |n| n % 2.0 == 0.0)
        })
        .unary(),
    )
    .unwrap();

    let def = SuiteDefinition::new("extensions", |s| {
        s.it("uses the extension", |t| {
            t.should("BeEven", AssertionInvocation::new(4, Value::Nil))?;
            t.should_not("BeEven", 3, Value::Nil)?;
            Ok(())
        })
    });
    let runner = SuiteRunner::new(RunConfig::default());
    let mut reporter = RecordingReporter::new();
    let report = runner.run_suite(&def, &mut reporter).unwrap();
    assert!(report.is_success());
    assert_eq!(
        reporter.outcome_of("uses the extension"),
        Some(&TestOutcome::Passed)
    );
    assert!(global_registry().read().unwrap().is_sealed());

    let err = register_operator(AssertionOperator::new("BeOdd", |_, _| true)).unwrap_err();
    assert!(matches!(err, BrambleError::RegistryLocked { ref name } if name == "BeOdd"));

    // Later suites still see every operator registered before sealing.
    let again = runner.discover(&def, &mut NullReporter).unwrap();
    assert!(again.is_success());
}
