use std::collections::BTreeMap;

pub const FEEDBACK_WINDOW_SECONDS: f64 = 2.5;

pub const TRACKED_ACTIONS: [&str; 13] = [
    "move",
    "jump",
    "land",
    "dash",
    "chainsaw bite",
    "chainsaw rev",
    "hit",
    "stagger",
    "execute",
    "take damage",
    "interact",
    "pickup",
    "menu navigate",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedbackChannel {
    Visual,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedbackStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct LastSeen {
    visual: Option<f64>,
    audio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackResult {
    pub action: &'static str,
    pub status: FeedbackStatus,
}

/// Freshness of visual and audio cues per player action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionFeedback {
    window: f64,
    events: BTreeMap<&'static str, LastSeen>,
}

impl Default for ActionFeedback {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionFeedback {
    pub fn new() -> Self {
        Self {
            window: FEEDBACK_WINDOW_SECONDS,
            events: TRACKED_ACTIONS
                .iter()
                .map(|action| (*action, LastSeen::default()))
                .collect(),
        }
    }

    pub fn reset(&mut self) {
        for seen in self.events.values_mut() {
            *seen = LastSeen::default();
        }
    }

    /// Untracked actions are ignored.
    pub fn record(&mut self, action: &str, channel: FeedbackChannel, time: f64) {
        let Some(seen) = self.events.get_mut(action) else {
            return;
        };
        match channel {
            FeedbackChannel::Visual => seen.visual = Some(time),
            FeedbackChannel::Audio => seen.audio = Some(time),
        }
    }

    pub fn status(&self, action: &str, time: f64) -> FeedbackStatus {
        let Some(seen) = self.events.get(action) else {
            return FeedbackStatus::Fail;
        };
        let fresh = |at: Option<f64>| at.is_some_and(|at| time - at <= self.window);
        match (fresh(seen.visual), fresh(seen.audio)) {
            (true, true) => FeedbackStatus::Pass,
            (false, false) => FeedbackStatus::Fail,
            _ => FeedbackStatus::Warn,
        }
    }

    /// One result per tracked action, in tracking order.
    pub fn summary(&self, time: f64) -> Vec<FeedbackResult> {
        TRACKED_ACTIONS
            .iter()
            .map(|&action| FeedbackResult {
                action,
                status: self.status(action, time),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_depends_on_both_channels_within_window() {
        let mut feedback = ActionFeedback::new();
        assert_eq!(feedback.status("jump", 0.0), FeedbackStatus::Fail);
        feedback.record("jump", FeedbackChannel::Visual, 1.0);
        assert_eq!(feedback.status("jump", 2.0), FeedbackStatus::Warn);
        feedback.record("jump", FeedbackChannel::Audio, 1.5);
        assert_eq!(feedback.status("jump", 3.5), FeedbackStatus::Pass);
        assert_eq!(feedback.status("jump", 3.8), FeedbackStatus::Warn);
        assert_eq!(feedback.status("jump", 10.0), FeedbackStatus::Fail);
    }

    #[test]
    fn unknown_actions_fail_and_are_not_recorded() {
        let mut feedback = ActionFeedback::new();
        feedback.record("moonwalk", FeedbackChannel::Audio, 0.0);
        assert_eq!(feedback.status("moonwalk", 0.0), FeedbackStatus::Fail);
        assert_eq!(feedback.summary(0.0).len(), TRACKED_ACTIONS.len());
    }

    #[test]
    fn reset_forgets_all_events() {
        let mut feedback = ActionFeedback::new();
        for action in TRACKED_ACTIONS {
            feedback.record(action, FeedbackChannel::Visual, 0.0);
            feedback.record(action, FeedbackChannel::Audio, 0.0);
        }
        assert!(feedback
            .summary(1.0)
            .iter()
            .all(|result| result.status == FeedbackStatus::Pass));
        feedback.reset();
        assert_eq!(feedback.summary(1.0)[0].status, FeedbackStatus::Fail);
        assert_eq!(feedback.summary(1.0)[0].action, "move");
    }
}
