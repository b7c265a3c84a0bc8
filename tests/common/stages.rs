//! Scripted stages that wrap the built-in ones and record every call.

use async_trait::async_trait;
use finsight_core::stages::{
    AnalysisStage, AnalysisStages, StageFailure, StageFailureReason, StageInput, StageKind,
    StageOutcome,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub type CallLog = Arc<Mutex<Vec<StageKind>>>;

#[derive(Debug, Clone)]
pub enum Behavior {
    /// Run the built-in implementation
    Delegate,
    /// Sleep, then run the built-in implementation
    Delay(Duration),
    Panic,
    /// Always fail with this reason
    Fail(StageFailureReason),
    /// Fail the first `n` calls, then delegate
    FailTimes(usize, StageFailureReason),
}

pub struct ScriptedStage {
    kind: StageKind,
    inner: Arc<dyn AnalysisStage>,
    behavior: Behavior,
    calls: AtomicUsize,
    log: CallLog,
}

impl ScriptedStage {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisStage for ScriptedStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    async fn evaluate(&self, input: StageInput<'_>) -> StageOutcome {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(self.kind);

        match &self.behavior {
            Behavior::Delegate => self.inner.evaluate(input).await,
            Behavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                self.inner.evaluate(input).await
            }
            Behavior::Panic => panic!("scripted panic in {}", self.kind),
            Behavior::Fail(reason) => Err(StageFailure::new(self.kind, reason.clone())),
            Behavior::FailTimes(times, reason) if call < *times => {
                Err(StageFailure::new(self.kind, reason.clone()))
            }
            Behavior::FailTimes(..) => self.inner.evaluate(input).await,
        }
    }
}

/// Four scripted stages sharing one call log
pub struct StageRig {
    log: CallLog,
    stages: Vec<Arc<ScriptedStage>>,
}

impl StageRig {
    pub fn new() -> Self {
        let log = CallLog::default();
        let builtin = AnalysisStages::builtin();
        let stages = StageKind::ORDERED
            .iter()
            .map(|&kind| scripted(kind, &builtin, Behavior::Delegate, &log))
            .collect();
        Self { log, stages }
    }

    pub fn with(mut self, kind: StageKind, behavior: Behavior) -> Self {
        let builtin = AnalysisStages::builtin();
        self.stages[index(kind)] = scripted(kind, &builtin, behavior, &self.log);
        self
    }

    pub fn stages(&self) -> AnalysisStages {
        self.stages
            .iter()
            .fold(AnalysisStages::builtin(), |stages, stage| {
                stages.with_stage(stage.clone() as Arc<dyn AnalysisStage>)
            })
    }

    pub fn calls(&self, kind: StageKind) -> usize {
        self.stages[index(kind)].calls()
    }

    /// Every invocation so far, in call order
    pub fn invoked(&self) -> Vec<StageKind> {
        self.log.lock().clone()
    }
}

impl Default for StageRig {
    fn default() -> Self {
        Self::new()
    }
}

fn scripted(
    kind: StageKind,
    builtin: &AnalysisStages,
    behavior: Behavior,
    log: &CallLog,
) -> Arc<ScriptedStage> {
    Arc::new(ScriptedStage {
        kind,
        inner: builtin.get(kind).clone(),
        behavior,
        calls: AtomicUsize::new(0),
        log: log.clone(),
    })
}

fn index(kind: StageKind) -> usize {
    StageKind::ORDERED
        .iter()
        .position(|k| *k == kind)
        .expect("every kind is ordered")
}
