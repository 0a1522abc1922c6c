//! Session behaviour against a solver that replays scripted status codes.

use std::collections::VecDeque;
use zode_solvers::{
    AuxParams, Complex64, IntegrationError, MethodClass, Options, Session, Solver, SolverCall,
    State, StepOutcome, Task, Tolerances,
};

/// What the session handed to the solver on one call.
#[derive(Clone, Debug, PartialEq)]
struct Record {
    istate: i32,
    neq: usize,
    t: f64,
    tout: f64,
    itol: i32,
    itask: i32,
    iopt: i32,
    mf: i32,
    lengths: (usize, usize, usize),
    calls_seen: i32,
}

/// Replays `(status, fraction of the way to tout)` pairs.
#[derive(Default)]
struct Scripted {
    script: VecDeque<(i32, f64)>,
    records: Vec<Record>,
}

impl Scripted {
    fn new(script: &[(i32, f64)]) -> Self {
        Scripted {
            script: script.iter().copied().collect(),
            records: Vec::new(),
        }
    }
}

impl Solver for Scripted {
    fn call(&mut self, call: SolverCall<'_>) {
        self.records.push(Record {
            istate: *call.istate,
            neq: call.neq,
            t: *call.t,
            tout: call.tout,
            itol: call.itol,
            itask: call.itask,
            iopt: call.iopt,
            mf: call.mf,
            lengths: (call.zwork.len(), call.rwork.len(), call.iwork.len()),
            calls_seen: call.iwork[0],
        });
        // Scratch persists between calls.
        call.iwork[0] += 1;

        let (code, fraction) = self.script.pop_front().unwrap_or((2, 1.0));
        let reached = if fraction == 1.0 {
            call.tout
        } else {
            *call.t + fraction * (call.tout - *call.t)
        };
        let mut dx = vec![Complex64::new(0.0, 0.0); call.neq];
        call.f.field(*call.t, call.y, &mut dx, call.aux);
        for (y, d) in call.y.iter_mut().zip(dx.iter()) {
            *y += *d * (reached - *call.t);
        }
        *call.t = reached;
        *call.istate = code;
    }
}

fn drift(_t: f64, _x: &[Complex64], dx: &mut [Complex64], aux: &AuxParams) {
    for d in dx.iter_mut() {
        *d = Complex64::new(aux.real.first().copied().unwrap_or(1.0), 0.0);
    }
}

fn scripted_session(
    script: &[(i32, f64)],
    method: MethodClass,
) -> Session<fn(f64, &[Complex64], &mut [Complex64], &AuxParams), Scripted> {
    Session::with_solver(
        Scripted::new(script),
        2,
        method,
        Tolerances::new(1e-6, 1e-6),
        drift as fn(f64, &[Complex64], &mut [Complex64], &AuxParams),
        0.0,
        Options::default(),
        AuxParams::default(),
    )
    .unwrap()
}

fn zero_state() -> State {
    State::from_vec(vec![Complex64::new(0.0, 0.0); 2])
}

#[test]
fn calls_follow_the_zvode_contract() {
    let mut session = scripted_session(&[], MethodClass::NonStiff);
    let mut x = zero_state();
    assert_eq!(session.step(&mut x, 0.5), Ok(0.5));
    assert_eq!(session.step(&mut x, 0.25), Ok(0.75));
    assert_eq!(x[0], Complex64::new(0.75, 0.0));

    let sizes = session.sizes();
    let records = &session.solver().records;
    assert_eq!(records.len(), 2);
    for (i, r) in records.iter().enumerate() {
        assert_eq!(r.neq, 2);
        assert_eq!(r.itol, 1);
        assert_eq!(r.itask, 1);
        assert_eq!(r.iopt, 0);
        assert_eq!(r.mf, 10);
        assert_eq!(r.lengths, (sizes.complex, sizes.real, sizes.int));
        assert_eq!(r.calls_seen, i as i32);
    }
    assert_eq!(records[0].istate, 1);
    assert_eq!((records[0].t, records[0].tout), (0.0, 0.5));
    assert_eq!(records[1].istate, 2);
    assert_eq!((records[1].t, records[1].tout), (0.5, 0.75));
}

#[test]
fn stiff_sessions_request_the_stiff_method() {
    let mut session = scripted_session(&[], MethodClass::Stiff);
    let mut x = zero_state();
    session.step(&mut x, 1.0).unwrap();
    let r = &session.solver().records[0];
    assert_eq!(r.mf, 22);
    assert_eq!(r.lengths, (24, 22, 32));
}

#[test]
fn options_are_forwarded() {
    let options = Options {
        task: Task::OneStep,
        max_steps: Some(2000),
        ..Options::default()
    };
    let aux = AuxParams::new(vec![3.0], vec![]);
    let mut session = Session::with_solver(
        Scripted::default(),
        1,
        MethodClass::NonStiff,
        Tolerances::new(1e-6, 1e-6),
        drift,
        1.0,
        options,
        aux,
    )
    .unwrap();
    let mut x = State::from_vec(vec![Complex64::new(0.0, 0.0)]);
    assert_eq!(session.step(&mut x, 2.0), Ok(3.0));
    assert_eq!(x[0], Complex64::new(6.0, 0.0));

    let r = &session.solver().records[0];
    assert_eq!(r.itask, 2);
    assert_eq!(r.iopt, 1);
}

#[test]
fn every_failure_code_is_classified() {
    let cases = [
        (-1, StepOutcome::ExcessWork),
        (-2, StepOutcome::ExcessAccuracyRequested),
        (-3, StepOutcome::IllegalInput),
        (-4, StepOutcome::RepeatedErrorTestFailure),
        (-5, StepOutcome::RepeatedConvergenceFailure),
        (-6, StepOutcome::VanishingErrorWeight),
    ];
    for (code, outcome) in cases.iter() {
        let mut session = scripted_session(&[(*code, 0.5)], MethodClass::NonStiff);
        let mut x = zero_state();
        let err = session.step(&mut x, 1.0).unwrap_err();
        assert_eq!(err.outcome(), *outcome);
        assert_eq!(session.status(), *code);
        assert_eq!(session.outcome(), Some(*outcome));
        // The error carries the time the solver reached.
        assert_eq!(session.time(), 0.5);
        assert_eq!(x[0], Complex64::new(0.5, 0.0));
    }
}

#[test]
fn failures_carry_the_time_reached() {
    let mut session = scripted_session(&[(-1, 0.25)], MethodClass::Stiff);
    let mut x = zero_state();
    assert_eq!(
        session.step(&mut x, 2.0),
        Err(IntegrationError::ExcessWork { t: 0.5 })
    );
}

#[test]
fn unrecognized_codes_are_never_success() {
    for code in [7, 1, 3, 0].iter() {
        let mut session = scripted_session(&[(*code, 1.0)], MethodClass::NonStiff);
        let mut x = zero_state();
        let err = session.step(&mut x, 1.0).unwrap_err();
        assert_eq!(
            err,
            IntegrationError::UnrecognizedStatus {
                code: *code,
                t: 1.0
            }
        );
        assert_eq!(err.outcome(), StepOutcome::Unrecognized(*code));
        assert!(!err.outcome().is_success());
    }
}

#[test]
fn failed_status_is_passed_back_until_resumed() {
    let mut session =
        scripted_session(&[(2, 1.0), (-1, 0.5), (-1, 0.5)], MethodClass::NonStiff);
    let mut x = zero_state();
    assert_eq!(session.step(&mut x, 1.0), Ok(1.0));
    assert!(session.step(&mut x, 1.0).is_err());
    assert!(session.step(&mut x, 0.5).is_err());
    assert_eq!(session.solver().records[2].istate, -1);
    assert_eq!(session.time(), 1.75);

    session.resume();
    assert_eq!(session.step(&mut x, 0.25), Ok(2.0));
    assert_eq!(session.solver().records[3].istate, 2);

    session.restart();
    session.step(&mut x, 1.0).unwrap();
    let last = session.solver().records.last().cloned();
    assert_eq!(last.map(|r| (r.istate, r.calls_seen)), Some((1, 4)));
}

#[test]
fn resume_without_a_completed_call_starts_afresh() {
    let mut session = scripted_session(&[(-5, 0.5)], MethodClass::Stiff);
    let mut x = zero_state();
    assert!(session.step(&mut x, 1.0).is_err());
    session.resume();
    session.step(&mut x, 1.0).unwrap();
    assert_eq!(session.solver().records[1].istate, 1);
}

#[test]
fn rejected_inputs_never_reach_the_solver() {
    let mut session = scripted_session(&[], MethodClass::NonStiff);
    let mut x = zero_state();
    assert!(session.step(&mut x, f64::INFINITY).is_err());
    let mut short = State::from_vec(vec![Complex64::new(0.0, 0.0)]);
    assert!(session.step(&mut short, 1.0).is_err());
    assert!(session.solver().records.is_empty());
    assert_eq!(session.status(), 1);
}
