use finsight_core::state_machine::{TaskEvent, TaskState};
use proptest::prelude::*;
use proptest::strategy::Just;

/// Sentences mixing financial statements with filler
pub fn document_text_strategy() -> impl Strategy<Value = String> {
    let sentence = prop_oneof![
        Just("Revenue grew 20% YoY.".to_string()),
        Just("Revenue fell 8% compared with last year.".to_string()),
        Just("Net income was $5M.".to_string()),
        Just("Net loss of $(2.5) million.".to_string()),
        Just("Profit margin of 3%.".to_string()),
        Just("Debt-to-equity ratio of 2.4x.".to_string()),
        Just("Operating cash flow of -$1.2M.".to_string()),
        Just("The company is subject to ongoing litigation.".to_string()),
        Just(format!("Total revenue of ${}.", "9".repeat(320))),
        "[a-z ]{0,40}",
    ];
    prop::collection::vec(sentence, 0..8).prop_map(|parts| parts.join(" "))
}

/// Queries, including blank ones
pub fn query_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("   ".to_string()),
        "[A-Za-z ?]{1,40}",
    ]
}

pub fn task_state_strategy() -> impl Strategy<Value = TaskState> {
    prop_oneof![
        Just(TaskState::Pending),
        Just(TaskState::Running),
        Just(TaskState::Completed),
        Just(TaskState::Failed),
    ]
}

pub fn task_event_strategy() -> impl Strategy<Value = TaskEvent> {
    prop_oneof![
        Just(TaskEvent::Start),
        Just(TaskEvent::Complete),
        Just(TaskEvent::Fail),
        Just(TaskEvent::Abandon),
    ]
}
