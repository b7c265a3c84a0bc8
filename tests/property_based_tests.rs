mod common;

use common::strategies::*;
use finsight_core::config::StageSettings;
use finsight_core::models::{AnalysisTask, DocumentRef, TaskFailure, TaskId};
use finsight_core::orchestration::{PipelineError, PipelineOrchestrator};
use finsight_core::stages::{metrics::extract_metrics, AnalysisStages};
use finsight_core::state_machine::{TaskEvent, TaskState, TaskStateMachine};
use chrono::Utc;
use proptest::prelude::*;
use std::time::Duration;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime builds")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: a run yields exactly one of result or error, and the result
    /// is internally consistent
    #[test]
    fn pipeline_outcome_is_exclusive(text in document_text_strategy(), query in query_strategy()) {
        let pipeline = PipelineOrchestrator::new(
            AnalysisStages::builtin(),
            Duration::from_secs(5),
            StageSettings::default(),
        );
        let query = if query.trim().is_empty() { "Analyze".to_string() } else { query };

        match runtime().block_on(pipeline.run(&text, &query)) {
            Ok(result) => {
                let confidence = result.recommendation.confidence.value();
                prop_assert!((0.0..=1.0).contains(&confidence));
                prop_assert!(!result.risks.is_empty());
                prop_assert!(result.risks.windows(2).all(|w| w[0].severity >= w[1].severity));
            }
            Err(PipelineError::Document(_)) => prop_assert!(text.trim().is_empty()),
            Err(PipelineError::NotAFinancialDocument { .. }) => {}
            Err(other) => prop_assert!(false, "built-in stages failed: {other:?}"),
        }
    }

    /// Property: the transition table only ever moves forward, and terminal
    /// states accept nothing
    #[test]
    fn transitions_never_leave_terminal_states(state in task_state_strategy(), event in task_event_strategy()) {
        match TaskStateMachine::determine_target_state(state, event) {
            Ok(target) => {
                prop_assert!(!state.is_terminal());
                prop_assert_eq!(state, TaskStateMachine::required_state(event));
                prop_assert_ne!(target, TaskState::Pending);
                prop_assert_eq!(target.is_terminal(), event.is_terminal());
            }
            Err(_) => prop_assert_ne!(state, TaskStateMachine::required_state(event)),
        }
    }

    /// Property: any event sequence applied to a task keeps the
    /// result/error invariant
    #[test]
    fn task_invariant_holds_for_any_event_sequence(events in prop::collection::vec(task_event_strategy(), 0..6)) {
        let mut task = AnalysisTask::new(TaskId::new(), "q", DocumentRef::inline("text"), Utc::now());

        for event in events {
            let before = task.clone();
            let applied = match event {
                TaskEvent::Start => task.start(Utc::now()),
                TaskEvent::Complete => task.complete(sample_result(), Utc::now()),
                TaskEvent::Fail => task.fail(
                    TaskFailure::from(PipelineError::NotAFinancialDocument { reason: "x".into() }),
                    Utc::now(),
                ),
                TaskEvent::Abandon => task.abandon(Utc::now()),
            };
            if applied.is_err() {
                prop_assert_eq!(&task, &before);
            }
            prop_assert!(task.check_invariant().is_ok());
        }
    }

    /// Property: metric extraction never panics and only reports finite values
    #[test]
    fn extracted_metrics_are_finite(text in document_text_strategy()) {
        let metrics = extract_metrics(&text);
        prop_assert!(metrics.iter().all(|(_, value)| value.value.is_finite()));
    }
}

fn sample_result() -> finsight_core::models::AnalysisResult {
    use finsight_core::models::{
        AnalysisResult, Confidence, DocumentType, FinancialMetrics, InvestmentAction,
        Recommendation,
    };

    AnalysisResult {
        company_name: None,
        document_type: DocumentType::FinancialDocument,
        metrics: FinancialMetrics::new(),
        recommendation: Recommendation {
            action: InvestmentAction::Hold,
            rationale: "test".to_string(),
            confidence: Confidence::clamped(0.5),
        },
        risks: Vec::new(),
        summary: "test".to_string(),
    }
}
