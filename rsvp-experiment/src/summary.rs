use rsvp_core::ResponseEvent;
use serde::{Deserialize, Serialize};

/// Response counts and reaction time statistics for a run.
///
/// Statistics that need more data than was collected are `None`; the standard
/// deviation is the sample (n - 1) estimate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_responses: usize,
    pub correct_responses: usize,
    /// Percentage of correct responses.
    pub accuracy: Option<f64>,
    pub mean_reaction_time: Option<f64>,
    pub median_reaction_time: Option<f64>,
    pub std_reaction_time: Option<f64>,
}

impl Summary {
    pub fn from_responses<'a>(responses: impl IntoIterator<Item = &'a ResponseEvent>) -> Self {
        let mut correct = 0;
        let mut rts: Vec<f64> = Vec::new();
        for response in responses {
            if response.correct {
                correct += 1;
            }
            rts.push(response.reaction_time);
        }
        let n = rts.len();
        if n == 0 {
            return Self::default();
        }

        let mean = rts.iter().sum::<f64>() / n as f64;
        rts.sort_by(f64::total_cmp);
        let median = if n % 2 == 1 {
            rts[n / 2]
        } else {
            (rts[n / 2 - 1] + rts[n / 2]) / 2.0
        };
        let std = (n > 1).then(|| {
            let var = rts.iter().map(|rt| (rt - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            var.sqrt()
        });

        Self {
            total_responses: n,
            correct_responses: correct,
            accuracy: Some(correct as f64 / n as f64 * 100.0),
            mean_reaction_time: Some(mean),
            median_reaction_time: Some(median),
            std_reaction_time: std,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn response(rt: f64, correct: bool) -> ResponseEvent {
        ResponseEvent {
            sequence_number: 1,
            image_position: 1,
            reaction_time: rt,
            correct,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn empty_run() {
        let summary = Summary::from_responses(std::iter::empty());
        assert_eq!(summary.total_responses, 0);
        assert_eq!(summary.accuracy, None);
        assert_eq!(summary.mean_reaction_time, None);
    }

    #[test]
    fn single_response_has_no_spread() {
        let summary = Summary::from_responses(&[response(0.4, true)]);
        assert_eq!(summary.median_reaction_time, Some(0.4));
        assert_eq!(summary.std_reaction_time, None);
        assert_eq!(summary.accuracy, Some(100.0));
    }

    #[test]
    fn statistics_over_four_responses() {
        let responses = [
            response(0.3, true),
            response(0.5, true),
            response(0.4, false),
            response(0.6, true),
        ];
        let summary = Summary::from_responses(&responses);
        assert_eq!(summary.total_responses, 4);
        assert_eq!(summary.correct_responses, 3);
        assert!((summary.accuracy.unwrap() - 75.0).abs() < 1e-9);
        assert!((summary.mean_reaction_time.unwrap() - 0.45).abs() < 1e-9);
        assert!((summary.median_reaction_time.unwrap() - 0.45).abs() < 1e-9);
        // sqrt(0.05 / 3)
        assert!((summary.std_reaction_time.unwrap() - 0.129_099_444_9).abs() < 1e-9);
    }
}
