// Demo suites exercising the framework end to end. Used by the CLI regression
// tests.
// Usage: cargo run --bin bramble-selftest -- [run|discover|operators] [flags]

use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;

use bramble::{AssertionInvocation, Declaration, SuiteDefinition, Value};

fn math() -> SuiteDefinition {
    SuiteDefinition::new("math", |s| {
        s.declare(Declaration::group("Math").tag("fast").group_body(|s| {
            s.it("adds", |t| {
                t.should_be(1 + 1, 2)?;
                Ok(())
            })?;
            s.declare(
                Declaration::test("doubles <x>")
                    .with_data(vec![
                        Value::map([("x", 1)]),
                        Value::map([("x", 2)]),
                        Value::map([("x", 3)]),
                    ])
                    .test_body(|t| {
                        let x = t.get("x").and_then(Value::as_number).unwrap_or_default();
                        t.should("BeGreaterThan", AssertionInvocation::new(x * 2.0, x))?;
                        Ok(())
                    }),
            )?;
            s.declare(
                Declaration::test("divides by zero")
                    .skip(true)
                    .test_body(|t| {
                        t.should_be(1.0 / 0.0, 0)?;
                        Ok(())
                    }),
            )
        }))
    })
}

fn strings() -> SuiteDefinition {
    SuiteDefinition::new("strings", |s| {
        s.describe("Strings", |s| {
            s.it("matches wildcards", |t| {
                t.should("BeLike", AssertionInvocation::new("Actual value", "actual *"))?;
                t.should_not("BeLike", "Actual value", "not actual *")?;
                Ok(())
            })?;
            s.it("matches patterns", |t| {
                t.should("Match", AssertionInvocation::new("bramble-0.1", r"^BRAMBLE-\d"))?;
                t.should("Contain", AssertionInvocation::new("a bramble bush", "bush"))?;
                Ok(())
            })
        })
    })
}

fn resources() -> SuiteDefinition {
    SuiteDefinition::new("resources", |s| {
        s.describe("Resources", |s| {
            let clock = Rc::new(RefCell::new("system"));
            s.it("substitutes a collaborator", move |t| {
                t.substitute(&clock, "frozen")?;
                let now = *clock.borrow();
                t.should_be(now, "frozen")?;
                Ok(())
            })?;
            s.it("writes scratch files", |t| {
                let dir = t.scratch_dir()?;
                let file = dir.join("note.txt");
                std::fs::write(&file, "hello")?;
                t.should_be(std::fs::read_to_string(&file)?, "hello")?;
                Ok(())
            })
        })
    })
}

fn switches() -> SuiteDefinition {
    SuiteDefinition::new("switches", |s| {
        s.describe("Switches", |s| {
            s.it("honours the fail switch", |t| {
                let fail = t.parameter("fail").cloned().unwrap_or(Value::Bool(false));
                t.should_not("Be", fail, true)?;
                Ok(())
            })
        })
    })
}

fn main() -> ExitCode {
    bramble::cli::run(vec![math(), strings(), resources(), switches()])
}
