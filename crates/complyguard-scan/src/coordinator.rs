use crate::WalkError;
use camino::Utf8PathBuf;
use complyguard_domain::{
    CancelToken, CompiledCheck, EvalContext, EvalError, Finding, FindingSet, PlannedCheck,
    PresenceState, ProbeOutcome, ScanPlan, SourceUnit,
};
use complyguard_types::{Coverage, Location, ids};
use serde_json::Value;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

/// One item from a walker.
pub type UnitResult = Result<Arc<dyn SourceUnit>, WalkError>;

#[derive(Clone, Debug)]
pub struct ScanOptions {
    /// Worker threads. Values below 1 are treated as 1.
    pub concurrency: usize,
    /// Absolute scan root; tree evaluators run here.
    pub root: Utf8PathBuf,
    /// Caller-supplied repository metadata, `Value::Null` when absent.
    pub metadata: Value,
}

impl ScanOptions {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            concurrency: 1,
            root: root.into(),
            metadata: Value::Null,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Clone, Debug)]
pub struct ScanOutcome {
    pub findings: FindingSet,
    pub coverage: Coverage,
}

enum Work {
    Tree(usize),
    Pair { check: usize, unit: Arc<dyn SourceUnit> },
}

/// Shared by every worker for the duration of one scan.
struct Shared<'a> {
    plan: &'a ScanPlan,
    ctx: EvalContext<'a>,
    states: Vec<Option<PresenceState>>,
    /// Set once any pair is skipped because the scan was stopped.
    interrupted: AtomicBool,
}

/// Evaluate `plan` against every unit the walker yields.
///
/// Tree rules run once each; unit and probe rules run once per applicable unit. Work flows
/// through a bounded channel of `concurrency * 2` slots, and the walker is only pulled when
/// a slot frees up. Findings are collected by a single thread. Presence rules conclude after
/// all workers have drained. Output depends only on the plan and the units, never on timing
/// or worker count, unless the scan is cancelled.
pub fn scan<W>(
    plan: &ScanPlan,
    walker: W,
    options: &ScanOptions,
    cancel: &CancelToken,
) -> ScanOutcome
where
    W: IntoIterator<Item = UnitResult>,
{
    let concurrency = options.concurrency.max(1);
    tracing::info!(
        rules = plan.checks().len(),
        concurrency,
        root = %options.root,
        "scan started"
    );

    let shared = Shared {
        plan,
        ctx: EvalContext {
            root: &options.root,
            metadata: &options.metadata,
            cancel,
        },
        states: plan
            .checks()
            .iter()
            .map(|c| matches!(c.check, CompiledCheck::Probe(_)).then(PresenceState::new))
            .collect(),
        interrupted: AtomicBool::new(false),
    };

    let (work_tx, work_rx) = mpsc::sync_channel::<Work>(concurrency * 2);
    let work_rx = Mutex::new(work_rx);
    let (found_tx, found_rx) = mpsc::channel::<Vec<Finding>>();

    let (findings, coverage) = thread::scope(|s| {
        let collector = s.spawn(move || collect(found_rx));

        let workers: Vec<_> = (0..concurrency)
            .map(|_| {
                let tx = found_tx.clone();
                let (shared, work_rx) = (&shared, &work_rx);
                s.spawn(move || worker(shared, work_rx, tx))
            })
            .collect();

        let produced = produce(&shared, walker, work_tx);

        for handle in workers {
            if let Err(panic) = handle.join() {
                std::panic::resume_unwind(panic);
            }
        }

        let complete = !produced.stopped && !shared.interrupted.load(Ordering::SeqCst);
        let coverage = Coverage {
            complete,
            units_scanned: produced.units,
            walk_errors: produced.walk_errors,
            reason: (!complete)
                .then(|| cancel.reason().unwrap_or(ids::REASON_SCAN_TIMEOUT).to_string()),
        };

        for (idx, planned) in plan.checks().iter().enumerate() {
            if let (CompiledCheck::Probe(check), Some(state)) =
                (&planned.check, &shared.states[idx])
            {
                let out = guarded(&planned.rule_id, None, || {
                    Ok(check.finalize(state, &coverage))
                });
                let _ = found_tx.send(out);
            }
        }
        drop(found_tx);

        match collector.join() {
            Ok(findings) => (findings, coverage),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    });

    tracing::info!(
        units = coverage.units_scanned,
        walk_errors = coverage.walk_errors,
        findings = findings.len(),
        complete = coverage.complete,
        "scan finished"
    );

    ScanOutcome { findings, coverage }
}

fn collect(rx: Receiver<Vec<Finding>>) -> FindingSet {
    let mut set = FindingSet::new();
    for batch in rx {
        set.extend(batch);
    }
    set
}

struct Produced {
    units: u64,
    walk_errors: u64,
    stopped: bool,
}

fn produce<W>(shared: &Shared<'_>, walker: W, tx: SyncSender<Work>) -> Produced
where
    W: IntoIterator<Item = UnitResult>,
{
    let mut produced = Produced {
        units: 0,
        walk_errors: 0,
        stopped: false,
    };
    let checks = shared.plan.checks();

    for (idx, planned) in checks.iter().enumerate() {
        if matches!(planned.check, CompiledCheck::Tree(_)) && tx.send(Work::Tree(idx)).is_err() {
            return produced;
        }
    }
    if !shared.plan.has_unit_work() {
        return produced;
    }

    for item in walker {
        let unit = match item {
            Ok(unit) => unit,
            Err(e) => {
                tracing::warn!("walk error: {e}");
                produced.walk_errors += 1;
                continue;
            }
        };
        produced.units += 1;

        for (idx, planned) in checks.iter().enumerate() {
            if !applies(planned, unit.as_ref()) {
                continue;
            }
            let work = Work::Pair {
                check: idx,
                unit: Arc::clone(&unit),
            };
            if tx.send(work).is_err() {
                return produced;
            }
        }

        // Checked after queueing: workers turn the pairs of a unit already pulled into
        // `scan_timeout` skips, so no pulled unit goes unreported.
        if shared.ctx.cancel.is_cancelled() {
            tracing::warn!("scan stopped before the walk finished");
            produced.stopped = true;
            break;
        }
    }
    produced
}

fn applies(planned: &PlannedCheck, unit: &dyn SourceUnit) -> bool {
    match &planned.check {
        CompiledCheck::Unit(c) => c.applies_to(unit.meta()),
        CompiledCheck::Probe(c) => c.applies_to(unit.meta()),
        CompiledCheck::Tree(_) => false,
    }
}

fn worker(shared: &Shared<'_>, work_rx: &Mutex<Receiver<Work>>, tx: Sender<Vec<Finding>>) {
    loop {
        let next = work_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        let Ok(work) = next else { return };

        let out = run(shared, work);
        if !out.is_empty() && tx.send(out).is_err() {
            return;
        }
    }
}

fn run(shared: &Shared<'_>, work: Work) -> Vec<Finding> {
    let ctx = &shared.ctx;
    match work {
        Work::Tree(idx) => {
            let planned = &shared.plan.checks()[idx];
            if ctx.cancel.is_cancelled() {
                return skipped(shared, &planned.rule_id, None);
            }
            let CompiledCheck::Tree(check) = &planned.check else {
                return Vec::new();
            };
            tracing::debug!(rule_id = %planned.rule_id, "tree check");
            finish(shared, &planned.rule_id, None, guarded_eval(|| check.evaluate(ctx)))
        }
        Work::Pair { check: idx, unit } => {
            let planned = &shared.plan.checks()[idx];
            let location = Some(Location::file(unit.path().clone()));
            if ctx.cancel.is_cancelled() {
                return skipped(shared, &planned.rule_id, location);
            }
            tracing::debug!(rule_id = %planned.rule_id, path = %unit.path(), "unit check");
            match &planned.check {
                CompiledCheck::Unit(check) => finish(
                    shared,
                    &planned.rule_id,
                    location,
                    guarded_eval(|| check.evaluate(unit.as_ref(), ctx)),
                ),
                CompiledCheck::Probe(check) => {
                    let probed = guarded_eval(|| check.probe(unit.as_ref(), ctx));
                    let state = shared.states[idx].as_ref();
                    match probed {
                        Ok(ProbeOutcome::Hit) => {
                            if let Some(state) = state {
                                state.record(unit.path());
                            }
                            Vec::new()
                        }
                        Ok(ProbeOutcome::Truncated) => {
                            if let Some(state) = state {
                                state.record_truncated();
                            }
                            Vec::new()
                        }
                        Ok(ProbeOutcome::Miss) => Vec::new(),
                        Err(e) => finish(shared, &planned.rule_id, location, Err(e)),
                    }
                }
                CompiledCheck::Tree(_) => Vec::new(),
            }
        }
    }
}

fn skipped(shared: &Shared<'_>, rule_id: &str, location: Option<Location>) -> Vec<Finding> {
    shared.interrupted.store(true, Ordering::SeqCst);
    vec![Finding::scan_timeout(rule_id, location)]
}

/// Turn an evaluation result into findings. Errors become one `Error` finding for the pair;
/// cancellation becomes one `Skipped` finding.
fn finish(
    shared: &Shared<'_>,
    rule_id: &str,
    location: Option<Location>,
    result: Result<Vec<Finding>, EvalError>,
) -> Vec<Finding> {
    match result {
        Ok(findings) => findings,
        Err(EvalError::Cancelled) => skipped(shared, rule_id, location),
        Err(e) => {
            tracing::warn!(
                rule_id,
                location = ?location.as_ref().map(ToString::to_string),
                "evaluator error: {e}"
            );
            vec![Finding::evaluator_error(rule_id, location, e.to_string())]
        }
    }
}

/// Run an evaluator, converting a panic into an [`EvalError`].
fn guarded_eval<T>(f: impl FnOnce() -> Result<T, EvalError>) -> Result<T, EvalError> {
    catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|panic| {
            Err(EvalError::Failed(format!(
                "evaluator panicked: {}",
                panic_message(panic.as_ref())
            )))
        })
}

/// Like [`guarded_eval`], for finalize steps that produce findings directly.
fn guarded(
    rule_id: &str,
    location: Option<Location>,
    f: impl FnOnce() -> Result<Vec<Finding>, EvalError>,
) -> Vec<Finding> {
    match guarded_eval(f) {
        Ok(findings) => findings,
        Err(e) => {
            tracing::warn!(rule_id, "evaluator error: {e}");
            vec![Finding::evaluator_error(rule_id, location, e.to_string())]
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
