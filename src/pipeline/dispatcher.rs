use std::time::{Duration, Instant};

use crate::{
    config::PipelineConfig,
    status::StatusText,
    types::{GestureResultChange, ResultField},
};

/// Playback controls the dispatcher is allowed to touch.
pub trait MediaPlayer {
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn position(&self) -> Duration;
    fn set_position(&mut self, position: Duration);
    /// `None` until the media has been opened.
    fn natural_duration(&self) -> Option<Duration>;
    fn volume(&self) -> f64;
    fn set_volume(&mut self, volume: f64);
}

/// The fixed gesture vocabulary. Names match the engine's output exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureCommand {
    PalmPunchRight,
    PalmPunchLeft,
    DoublePalm,
    SwipeHandRight,
    SwipeHandLeft,
    RaiseArmRight,
    RaiseArmLeft,
}

impl GestureCommand {
    pub const ALL: [GestureCommand; 7] = [
        GestureCommand::PalmPunchRight,
        GestureCommand::PalmPunchLeft,
        GestureCommand::DoublePalm,
        GestureCommand::SwipeHandRight,
        GestureCommand::SwipeHandLeft,
        GestureCommand::RaiseArmRight,
        GestureCommand::RaiseArmLeft,
    ];

    pub fn from_gesture_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.gesture_name() == name)
    }

    pub fn gesture_name(&self) -> &'static str {
        match self {
            GestureCommand::PalmPunchRight => "PalmPunch_Right",
            GestureCommand::PalmPunchLeft => "PalmPunch_Left",
            GestureCommand::DoublePalm => "DoublePalm",
            GestureCommand::SwipeHandRight => "SwipeHand_Right",
            GestureCommand::SwipeHandLeft => "SwipeHand_Left",
            GestureCommand::RaiseArmRight => "RaiseArm_Right",
            GestureCommand::RaiseArmLeft => "RaiseArm_Left",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MediaAction {
    Play,
    Pause,
    Stop,
    Seek(Duration),
    SetVolume(f64),
}

/// What a result change amounted to.
#[derive(Clone, Debug, PartialEq)]
pub enum Dispatch {
    /// Not a gesture event: wrong field, not detected, or unnamed.
    Ignored,
    /// A gesture event inside the cooldown window.
    Debounced { elapsed: Duration },
    /// A gesture event with no mapped command.
    Unmapped,
    /// The command would have left its bounds.
    Skipped(GestureCommand),
    Executed(MediaAction),
}

#[derive(Debug)]
struct DispatchState {
    last_event: Instant,
    event_counter: u64,
}

pub struct GestureDispatcher {
    cooldown: Duration,
    seek_step: Duration,
    volume_step: f64,
    state: DispatchState,
}

impl GestureDispatcher {
    /// `now` starts the first cooldown window.
    pub fn new(config: &PipelineConfig, now: Instant) -> Self {
        Self {
            cooldown: config.cooldown,
            seek_step: config.seek_step,
            volume_step: config.volume_step,
            state: DispatchState {
                last_event: now,
                event_counter: 0,
            },
        }
    }

    pub fn event_counter(&self) -> u64 {
        self.state.event_counter
    }

    /// Handles one result change notification.
    ///
    /// Every gesture event updates the status text and restarts the
    /// cooldown; only events arriving after a full cooldown reach the
    /// player.
    pub fn handle(
        &mut self,
        change: &GestureResultChange,
        now: Instant,
        player: &mut impl MediaPlayer,
        status: &mut StatusText,
    ) -> Dispatch {
        if change.field != ResultField::Detected || !change.result.is_gesture() {
            return Dispatch::Ignored;
        }
        let name = change.result.gesture_name.as_str();

        let elapsed = now.saturating_duration_since(self.state.last_event);
        status.set(status_line(name, self.state.event_counter, elapsed));
        self.state.last_event = now;
        self.state.event_counter += 1;

        if elapsed <= self.cooldown {
            log::debug!("{name} debounced after {elapsed:?}");
            return Dispatch::Debounced { elapsed };
        }

        let Some(command) = GestureCommand::from_gesture_name(name) else {
            log::debug!("no command mapped to gesture {name:?}");
            return Dispatch::Unmapped;
        };

        match self.plan(command, player) {
            Some(action) => {
                log::info!("{name} -> {action:?}");
                apply(action, player);
                Dispatch::Executed(action)
            }
            None => {
                log::debug!("{name} skipped at playback bounds");
                Dispatch::Skipped(command)
            }
        }
    }

    /// The bounded action for `command`, or `None` when the current
    /// playback state leaves no room for it.
    fn plan(&self, command: GestureCommand, player: &impl MediaPlayer) -> Option<MediaAction> {
        match command {
            GestureCommand::PalmPunchRight => Some(MediaAction::Play),
            GestureCommand::PalmPunchLeft => Some(MediaAction::Pause),
            GestureCommand::DoublePalm => Some(MediaAction::Stop),
            GestureCommand::SwipeHandRight => {
                let target = player.position() + self.seek_step;
                let duration = player.natural_duration()?;
                (target < duration).then_some(MediaAction::Seek(target))
            }
            GestureCommand::SwipeHandLeft => player
                .position()
                .checked_sub(self.seek_step)
                .filter(|target| !target.is_zero())
                .map(MediaAction::Seek),
            GestureCommand::RaiseArmRight => {
                let volume = player.volume();
                (volume < 1.0).then(|| step_volume(volume, self.volume_step))
            }
            GestureCommand::RaiseArmLeft => {
                let volume = player.volume();
                (volume > 0.0).then(|| step_volume(volume, -self.volume_step))
            }
        }
    }
}

fn step_volume(volume: f64, step: f64) -> MediaAction {
    MediaAction::SetVolume((volume + step).clamp(0.0, 1.0))
}

fn apply(action: MediaAction, player: &mut impl MediaPlayer) {
    match action {
        MediaAction::Play => player.play(),
        MediaAction::Pause => player.pause(),
        MediaAction::Stop => player.stop(),
        MediaAction::Seek(position) => player.set_position(position),
        MediaAction::SetVolume(volume) => player.set_volume(volume),
    }
}

pub fn status_line(gesture_name: &str, event_counter: u64, elapsed: Duration) -> String {
    format!(
        "{gesture_name} {event_counter} Seconds: {:.3}",
        elapsed.as_secs_f64()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GestureResult, PlaybackState, PlaybackStatus};

    #[derive(Default)]
    struct RecordingPlayer {
        state: PlaybackState,
        commands: Vec<MediaAction>,
    }

    impl RecordingPlayer {
        fn at(position_ms: u64, duration_ms: u64, volume: f64) -> Self {
            Self {
                state: PlaybackState {
                    position: Duration::from_millis(position_ms),
                    natural_duration: Some(Duration::from_millis(duration_ms)),
                    volume,
                    ..PlaybackState::default()
                },
                commands: Vec::new(),
            }
        }
    }

    impl MediaPlayer for RecordingPlayer {
        fn play(&mut self) {
            self.state.status = PlaybackStatus::Playing;
            self.commands.push(MediaAction::Play);
        }

        fn pause(&mut self) {
            self.state.status = PlaybackStatus::Paused;
            self.commands.push(MediaAction::Pause);
        }

        fn stop(&mut self) {
            self.state.status = PlaybackStatus::Stopped;
            self.commands.push(MediaAction::Stop);
        }

        fn position(&self) -> Duration {
            self.state.position
        }

        fn set_position(&mut self, position: Duration) {
            self.state.position = position;
            self.commands.push(MediaAction::Seek(position));
        }

        fn natural_duration(&self) -> Option<Duration> {
            self.state.natural_duration
        }

        fn volume(&self) -> f64 {
            self.state.volume
        }

        fn set_volume(&mut self, volume: f64) {
            self.state.volume = volume;
            self.commands.push(MediaAction::SetVolume(volume));
        }
    }

    struct Harness {
        start: Instant,
        dispatcher: GestureDispatcher,
        player: RecordingPlayer,
        status: StatusText,
    }

    impl Harness {
        fn new(player: RecordingPlayer) -> Self {
            let start = Instant::now();
            Self {
                start,
                dispatcher: GestureDispatcher::new(&PipelineConfig::default(), start),
                player,
                status: StatusText::new(),
            }
        }

        fn gesture_at(&mut self, name: &str, secs: f64) -> Dispatch {
            let change = detected(name);
            let now = self.start + Duration::from_secs_f64(secs);
            self.dispatcher
                .handle(&change, now, &mut self.player, &mut self.status)
        }
    }

    fn detected(name: &str) -> GestureResultChange {
        GestureResultChange {
            field: ResultField::Detected,
            result: GestureResult {
                gesture_name: name.to_string(),
                detected: true,
                confidence: 0.8,
            },
        }
    }

    #[test]
    fn maps_every_gesture_name() {
        for command in GestureCommand::ALL {
            assert_eq!(
                GestureCommand::from_gesture_name(command.gesture_name()),
                Some(command)
            );
        }
        assert_eq!(GestureCommand::from_gesture_name("doublepalm"), None);
        assert_eq!(GestureCommand::from_gesture_name("Wave"), None);
    }

    #[test]
    fn double_palm_after_two_seconds_stops_once() {
        let mut h = Harness::new(RecordingPlayer::default());

        let outcome = h.gesture_at("DoublePalm", 2.0);

        assert_eq!(outcome, Dispatch::Executed(MediaAction::Stop));
        assert_eq!(h.player.commands, vec![MediaAction::Stop]);
        assert_eq!(h.status.get(), "DoublePalm 0 Seconds: 2.000");
        assert_eq!(h.dispatcher.event_counter(), 1);
    }

    #[test]
    fn repeat_within_cooldown_updates_status_only() {
        let mut h = Harness::new(RecordingPlayer::default());

        assert_eq!(
            h.gesture_at("PalmPunch_Right", 2.0),
            Dispatch::Executed(MediaAction::Play)
        );
        let second = h.gesture_at("PalmPunch_Right", 2.5);

        assert!(matches!(second, Dispatch::Debounced { .. }));
        assert_eq!(h.player.commands, vec![MediaAction::Play]);
        assert_eq!(h.status.get(), "PalmPunch_Right 1 Seconds: 0.500");
    }

    #[test]
    fn events_outside_cooldown_both_act() {
        let mut h = Harness::new(RecordingPlayer::default());

        h.gesture_at("PalmPunch_Left", 2.0);
        h.gesture_at("PalmPunch_Left", 3.5);

        assert_eq!(h.player.commands, vec![MediaAction::Pause, MediaAction::Pause]);
    }

    #[test]
    fn debounced_events_restart_the_window() {
        let mut h = Harness::new(RecordingPlayer::default());

        h.gesture_at("DoublePalm", 2.0);
        h.gesture_at("DoublePalm", 2.8);
        // 1.6s after the first, but only 0.8s after the second.
        let third = h.gesture_at("DoublePalm", 3.6);

        assert!(matches!(third, Dispatch::Debounced { .. }));
        assert_eq!(h.player.commands.len(), 1);
        assert_eq!(h.dispatcher.event_counter(), 3);
    }

    #[test]
    fn exactly_one_second_is_still_debounced() {
        let mut h = Harness::new(RecordingPlayer::default());
        h.gesture_at("DoublePalm", 2.0);
        assert!(matches!(
            h.gesture_at("DoublePalm", 3.0),
            Dispatch::Debounced { .. }
        ));
    }

    #[test]
    fn event_right_after_start_is_debounced() {
        let mut h = Harness::new(RecordingPlayer::default());
        assert!(matches!(
            h.gesture_at("DoublePalm", 0.2),
            Dispatch::Debounced { .. }
        ));
        assert!(h.player.commands.is_empty());
    }

    #[test]
    fn non_detected_changes_are_ignored() {
        let mut h = Harness::new(RecordingPlayer::default());
        let now = h.start + Duration::from_secs(5);

        let mut name_change = detected("DoublePalm");
        name_change.field = ResultField::GestureName;
        let mut undetected = detected("DoublePalm");
        undetected.result.detected = false;
        let unnamed = detected("");

        for change in [name_change, undetected, unnamed] {
            let outcome = h
                .dispatcher
                .handle(&change, now, &mut h.player, &mut h.status);
            assert_eq!(outcome, Dispatch::Ignored);
        }
        assert_eq!(h.status.get(), "");
        assert_eq!(h.dispatcher.event_counter(), 0);
    }

    #[test]
    fn unknown_gesture_updates_status_without_action() {
        let mut h = Harness::new(RecordingPlayer::default());
        assert_eq!(h.gesture_at("Wave", 2.0), Dispatch::Unmapped);
        assert!(h.status.get().starts_with("Wave 0"));
        assert!(h.player.commands.is_empty());
    }

    #[test]
    fn seek_forward_stays_before_end() {
        let mut h = Harness::new(RecordingPlayer::at(10_000, 20_000, 0.5));
        assert_eq!(
            h.gesture_at("SwipeHand_Right", 2.0),
            Dispatch::Executed(MediaAction::Seek(Duration::from_millis(15_000)))
        );
        // 15s + 5s is not before the 20s end.
        assert_eq!(
            h.gesture_at("SwipeHand_Right", 4.0),
            Dispatch::Skipped(GestureCommand::SwipeHandRight)
        );
        assert_eq!(h.player.state.position, Duration::from_millis(15_000));
    }

    #[test]
    fn seek_forward_without_media_is_skipped() {
        let mut h = Harness::new(RecordingPlayer::default());
        assert_eq!(
            h.gesture_at("SwipeHand_Right", 2.0),
            Dispatch::Skipped(GestureCommand::SwipeHandRight)
        );
    }

    #[test]
    fn seek_backward_stays_after_start() {
        let mut h = Harness::new(RecordingPlayer::at(7_000, 20_000, 0.5));
        assert_eq!(
            h.gesture_at("SwipeHand_Left", 2.0),
            Dispatch::Executed(MediaAction::Seek(Duration::from_millis(2_000)))
        );
        assert_eq!(
            h.gesture_at("SwipeHand_Left", 4.0),
            Dispatch::Skipped(GestureCommand::SwipeHandLeft)
        );

        let mut exact = Harness::new(RecordingPlayer::at(5_000, 20_000, 0.5));
        assert_eq!(
            exact.gesture_at("SwipeHand_Left", 2.0),
            Dispatch::Skipped(GestureCommand::SwipeHandLeft)
        );
    }

    #[test]
    fn volume_up_clamps_at_one() {
        let mut h = Harness::new(RecordingPlayer::at(0, 1_000, 0.95));

        assert_eq!(
            h.gesture_at("RaiseArm_Right", 2.0),
            Dispatch::Executed(MediaAction::SetVolume(1.0))
        );
        assert_eq!(
            h.gesture_at("RaiseArm_Right", 4.0),
            Dispatch::Skipped(GestureCommand::RaiseArmRight)
        );
        assert_eq!(h.player.state.volume, 1.0);
    }

    #[test]
    fn volume_down_clamps_at_zero() {
        let mut h = Harness::new(RecordingPlayer::at(0, 1_000, 0.05));

        assert_eq!(
            h.gesture_at("RaiseArm_Left", 2.0),
            Dispatch::Executed(MediaAction::SetVolume(0.0))
        );
        assert_eq!(
            h.gesture_at("RaiseArm_Left", 4.0),
            Dispatch::Skipped(GestureCommand::RaiseArmLeft)
        );
    }

    #[test]
    fn volume_steps_stay_in_range() {
        let mut h = Harness::new(RecordingPlayer::at(0, 1_000, 0.5));
        let mut t = 0.0;
        for name in ["RaiseArm_Right"; 8].into_iter().chain(["RaiseArm_Left"; 14]) {
            t += 2.0;
            h.gesture_at(name, t);
            let volume = h.player.state.volume;
            assert!((0.0..=1.0).contains(&volume), "volume {volume} escaped");
        }
        assert_eq!(h.player.state.volume, 0.0);
    }
}
