//! Mock Alignment Observer for Testing
//!
//! Records every observer call in arrival order.

use std::sync::Mutex;

use readalong::{AlignmentObserver, WordColor};

#[derive(Debug, Clone, PartialEq)]
pub enum ObserverCall {
    Mark(usize, WordColor),
    Cursor(usize),
    ShowDebt(usize),
    HideDebt(usize),
    Focus(Option<usize>),
    Metric(String, String),
    Failed(i32),
}

#[derive(Debug, Default)]
pub struct MockObserver {
    pub calls: Mutex<Vec<ObserverCall>>,
}

impl MockObserver {
    fn record(&self, call: ObserverCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<ObserverCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn cursor_moves(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ObserverCall::Cursor(i) => Some(i),
                _ => None,
            })
            .collect()
    }

    pub fn marks_for(&self, index: usize) -> Vec<WordColor> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ObserverCall::Mark(i, color) if i == index => Some(color),
                _ => None,
            })
            .collect()
    }

    pub fn metric_count(&self, key: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ObserverCall::Metric(k, _) if k == key))
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl AlignmentObserver for MockObserver {
    fn mark_word(&self, index: usize, color: WordColor) {
        self.record(ObserverCall::Mark(index, color));
    }

    fn advance_cursor_to(&self, index: usize) {
        self.record(ObserverCall::Cursor(index));
    }

    fn show_debt_marker(&self, index: usize) {
        self.record(ObserverCall::ShowDebt(index));
    }

    fn hide_debt_marker(&self, index: usize) {
        self.record(ObserverCall::HideDebt(index));
    }

    fn focus_changed(&self, index: Option<usize>) {
        self.record(ObserverCall::Focus(index));
    }

    fn log_metric(&self, key: &str, value: &str) {
        self.record(ObserverCall::Metric(key.to_string(), value.to_string()));
    }

    fn recognizer_failed(&self, code: i32) {
        self.record(ObserverCall::Failed(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_observer_records_in_order() {
        let mock = MockObserver::default();
        mock.mark_word(0, WordColor::Green);
        mock.advance_cursor_to(1);
        assert_eq!(
            mock.calls(),
            vec![ObserverCall::Mark(0, WordColor::Green), ObserverCall::Cursor(1)]
        );
        assert_eq!(mock.cursor_moves(), vec![1]);
    }
}
