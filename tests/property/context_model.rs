//! Property-based tests for the active context model

use chrono::Utc;
use keeper::context::{
    ActiveContext, ConversationEntry, TaskStatus, TaskUpdate, CONVERSATION_HISTORY_LIMIT,
};
use proptest::prelude::*;

fn status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Pending),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Blocked),
        Just(TaskStatus::Completed),
        Just(TaskStatus::Failed),
        Just(TaskStatus::Cancelled),
    ]
}

proptest! {
    /// History keeps the newest entries, oldest first, never above the cap.
    #[test]
    fn conversation_history_is_bounded(count in 0usize..400) {
        let mut context = ActiveContext::new();
        for i in 0..count {
            context.add_conversation_entry(ConversationEntry {
                speaker: "orchestrator".to_string(),
                summary: format!("turn {}", i),
                timestamp: Utc::now(),
            });
        }
        let kept = context.conversation_history.len();
        prop_assert_eq!(kept, count.min(CONVERSATION_HISTORY_LIMIT));
        if count > 0 {
            let last = context.conversation_history.back().unwrap();
            prop_assert_eq!(&last.summary, &format!("turn {}", count - 1));
            let first = context.conversation_history.front().unwrap();
            prop_assert_eq!(&first.summary, &format!("turn {}", count - kept));
        }
    }

    /// Percentages never exceed 100 however they are set.
    #[test]
    fn percentage_is_clamped(values in prop::collection::vec(any::<u8>(), 1..20)) {
        let mut context = ActiveContext::new();
        for value in &values {
            context.update_task_progress("t", TaskUpdate::new().percentage(*value), Utc::now());
        }
        let stored = context.task_progress["t"].percentage;
        prop_assert!(stored <= 100);
        prop_assert_eq!(stored, (*values.last().unwrap()).min(100));
    }

    /// Open tasks are exactly the non-terminal ones.
    #[test]
    fn open_tasks_are_non_terminal(statuses in prop::collection::vec(status_strategy(), 0..15)) {
        let mut context = ActiveContext::new();
        for (i, status) in statuses.iter().enumerate() {
            context.update_task_progress(&format!("t{}", i), TaskUpdate::new().status(*status), Utc::now());
        }
        let open = context.open_tasks().count();
        let expected = statuses.iter().filter(|s| !s.is_terminal()).count();
        prop_assert_eq!(open, expected);
    }
}
