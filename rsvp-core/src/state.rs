/// States a single sequence walks through, in presentation order.
///
/// `Image(i)` and `IsiWait(i)` carry the 0-based position inside the plan.
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum SequenceState {
    BlankLead,
    Image(usize),
    IsiWait(usize),
    BlankTrail,
    Done,
    Cancelled,
}

impl Default for SequenceState {
    fn default() -> Self {
        SequenceState::BlankLead
    }
}

impl SequenceState {
    /// Successor on the normal (non-cancelled) path for a plan of `seq_length` images.
    pub fn next(&self, seq_length: usize) -> Option<Self> {
        use SequenceState::*;
        Some(match *self {
            BlankLead if seq_length == 0 => BlankTrail,
            BlankLead => Image(0),
            Image(i) => IsiWait(i),
            IsiWait(i) if i + 1 < seq_length => Image(i + 1),
            IsiWait(_) => BlankTrail,
            BlankTrail => Done,
            Done | Cancelled => return None,
        })
    }

    /// States in which the response channel is polled and a cancel can land.
    pub fn is_poll_point(&self) -> bool {
        matches!(
            self,
            SequenceState::BlankLead | SequenceState::IsiWait(_) | SequenceState::BlankTrail
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SequenceState::Done | SequenceState::Cancelled)
    }

    pub fn presents_frame(&self) -> bool {
        matches!(
            self,
            SequenceState::BlankLead | SequenceState::Image(_) | SequenceState::BlankTrail
        )
    }
}

#[cfg(test)]
mod tests {
    use super::SequenceState::*;
    use super::*;

    #[test]
    fn walks_the_full_sequence() {
        let mut state = SequenceState::default();
        let mut visited = vec![state];
        while let Some(next) = state.next(3) {
            visited.push(next);
            state = next;
        }
        assert_eq!(
            visited,
            vec![
                BlankLead,
                Image(0),
                IsiWait(0),
                Image(1),
                IsiWait(1),
                Image(2),
                IsiWait(2),
                BlankTrail,
                Done
            ]
        );
    }

    #[test]
    fn frame_count_matches_lead_images_trail() {
        let mut state = SequenceState::default();
        let mut frames = usize::from(state.presents_frame());
        while let Some(next) = state.next(10) {
            frames += usize::from(next.presents_frame());
            state = next;
        }
        assert_eq!(frames, 12);
    }

    #[test]
    fn terminal_states_have_no_successor() {
        assert!(Done.next(4).is_none());
        assert!(Cancelled.next(4).is_none());
        assert!(Cancelled.is_terminal());
        assert!(!Image(2).is_poll_point());
        assert!(IsiWait(2).is_poll_point());
    }
}
