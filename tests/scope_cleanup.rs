// Resources registered from test bodies are released when their block ends.

mod common;

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use bramble::report::{Failure, SuiteOutcome, TestOutcome};
use bramble::{BrambleError, SuiteDefinition};

#[test]
fn cleanup_runs_once_when_the_test_panics() {
    let released = Rc::new(Cell::new(0));
    let r = released.clone();
    let def = SuiteDefinition::new("cleanup", move |s| {
        let r = r.clone();
        s.it("panics after registering", move |t| {
            let r = r.clone();
            t.defer("count release", move || {
                r.set(r.get() + 1);
                Ok(())
            })?;
            panic!("boom")
        })
    });

    let (_, reporter) = common::run(&def);
    assert_eq!(released.get(), 1);
    assert_eq!(
        reporter.outcome_of("panics after registering"),
        Some(&TestOutcome::Failed(Failure::Fault("panic: boom".into())))
    );
}

#[test]
fn early_release_is_not_repeated() {
    let released = Rc::new(Cell::new(0));
    let r = released.clone();
    let def = SuiteDefinition::new("cleanup", move |s| {
        let r = r.clone();
        s.it("releases early", move |t| {
            let r = r.clone();
            let handle = t.defer("count release", move || {
                r.set(r.get() + 1);
                Ok(())
            })?;
            assert!(t.release(handle)?);
            assert!(!t.release(handle)?);
            Ok(())
        })
    });

    let (report, _) = common::run(&def);
    assert!(report.is_success());
    assert_eq!(released.get(), 1);
}

#[test]
fn substitution_is_undone_after_the_test() {
    let clock = Rc::new(RefCell::new("system"));
    let observed = Rc::new(RefCell::new(Vec::new()));
    let (c, o) = (clock.clone(), observed.clone());
    let def = SuiteDefinition::new("substitution", move |s| {
        let (c, o) = (c.clone(), o.clone());
        s.describe("Clock", move |s| {
            let (c1, o1) = (c.clone(), o.clone());
            s.it("is frozen", move |t| {
                t.substitute(&c1, "frozen")?;
                o1.borrow_mut().push(*c1.borrow());
                Ok(())
            })?;
            let (c2, o2) = (c.clone(), o.clone());
            s.it("is restored", move |_| {
                o2.borrow_mut().push(*c2.borrow());
                Ok(())
            })
        })
    });

    let (report, _) = common::run(&def);
    assert!(report.is_success());
    assert_eq!(*observed.borrow(), vec!["frozen", "system"]);
    assert_eq!(*clock.borrow(), "system");
}

#[test]
fn scratch_directory_is_removed_after_the_test() {
    let path = Rc::new(RefCell::new(None::<PathBuf>));
    let p = path.clone();
    let def = SuiteDefinition::new("scratch", move |s| {
        let p = p.clone();
        s.it("writes a file", move |t| {
            let dir = t.scratch_dir()?;
            std::fs::write(dir.join("out.txt"), "data")?;
            t.should_be(dir.join("out.txt").exists(), true)?;
            *p.borrow_mut() = Some(dir);
            Ok(())
        })
    });

    let (report, _) = common::run(&def);
    assert!(report.is_success());
    let dir = path.borrow().clone().unwrap();
    assert!(!dir.exists());
}

#[test]
fn group_resources_outlive_their_tests() {
    let log = common::log();
    let l = log.clone();
    let def = SuiteDefinition::new("scopes", move |s| {
        let l = l.clone();
        s.describe("G", move |s| {
            let (before, after) = (l.clone(), l.clone());
            s.before_all(move |t| {
                let after = after.clone();
                t.defer("group fixture", move || {
                    after.borrow_mut().push("group released".into());
                    Ok(())
                })?;
                before.borrow_mut().push("group acquired".into());
                Ok(())
            })?;
            let (body, cleanup) = (l.clone(), l.clone());
            s.it("A", move |t| {
                let cleanup = cleanup.clone();
                t.defer("test fixture", move || {
                    cleanup.borrow_mut().push("test released".into());
                    Ok(())
                })?;
                body.borrow_mut().push("A".into());
                Ok(())
            })?;
            s.it("B", common::note(&l, "B"))
        })
    });

    let (report, _) = common::run(&def);
    assert!(report.is_success());
    assert_eq!(
        common::entries(&log),
        ["group acquired", "A", "test released", "B", "group released"]
    );
}

#[test]
fn failed_release_does_not_stop_other_releases() {
    let released = Rc::new(Cell::new(0));
    let r = released.clone();
    let def = SuiteDefinition::new("cleanup", move |s| {
        let r = r.clone();
        s.it("registers two", move |t| {
            let r = r.clone();
            t.defer("counted", move || {
                r.set(r.get() + 1);
                Ok(())
            })?;
            t.defer("broken", || Err(BrambleError::fault("cannot close socket")))?;
            Ok(())
        })
    });

    let (report, _) = common::run(&def);
    assert!(report.is_success());
    assert_eq!(released.get(), 1);
}

#[test]
fn panicking_cleanup_does_not_disturb_later_tests() {
    let log = common::log();
    let l = log.clone();
    let def = SuiteDefinition::new("cleanup", move |s| {
        let g = l.clone();
        s.describe("G", move |s| {
            let first = g.clone();
            s.it("A", move |t| {
                let first = first.clone();
                t.defer("first", move || {
                    first.borrow_mut().push("first".into());
                    Ok(())
                })?;
                t.defer("explodes", || panic!("cleanup blew up"))?;
                Ok(())
            })?;
            s.it("B", common::note(&g, "B"))
        })?;
        s.it("C", common::note(&l, "C"))
    });

    let (report, reporter) = common::run(&def);
    assert_eq!(report.outcome, SuiteOutcome::Completed);
    assert_eq!(common::entries(&log), ["first", "B", "C"]);
    for path in ["G.A", "G.B", "C"] {
        assert_eq!(reporter.outcome_of(path), Some(&TestOutcome::Passed), "{}", path);
    }
}
