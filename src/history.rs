use std::collections::VecDeque;

/// Fixed-capacity FIFO window over recent motion scores.
#[derive(Debug, Clone)]
pub struct MotionHistory {
    capacity: usize,
    scores: VecDeque<f64>,
}

impl MotionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            scores: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append a score, evicting the oldest one past capacity.
    pub fn push(&mut self, score: f64) {
        self.scores.push_back(score);
        while self.scores.len() > self.capacity {
            self.scores.pop_front();
        }
    }

    /// Arithmetic mean of the window, or `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.scores.is_empty() {
            return None;
        }
        Some(self.scores.iter().sum::<f64>() / self.scores.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.scores.clear();
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.scores.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_of_empty_history() {
        let history = MotionHistory::new(6);
        assert!(history.mean().is_none());
        assert!(history.is_empty());
    }

    #[test]
    fn test_fifo_eviction() {
        let mut history = MotionHistory::new(6);
        for score in 1..=7 {
            history.push(score as f64);
            assert!(history.len() <= history.capacity());
        }

        let scores: Vec<f64> = history.iter().copied().collect();
        assert_eq!(scores, vec![2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert!(!scores.contains(&1.0));
    }

    #[test]
    fn test_mean() {
        let mut history = MotionHistory::new(6);
        for score in [200.0, 210.0, 195.0, 205.0] {
            history.push(score);
        }
        assert_eq!(history.mean(), Some(202.5));

        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut history = MotionHistory::new(0);
        history.push(3.0);
        history.push(4.0);
        assert_eq!(history.len(), 1);
        assert_eq!(history.mean(), Some(4.0));
    }
}
