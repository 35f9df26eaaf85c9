//! The device setup page
//!
//! Owns at most one capture stream and at most one level monitor. Every
//! path that replaces or ends the stream stops the monitor first, then
//! releases the stream, and only then opens anything new.

use super::{PageEvent, PageState};
use crate::error::PreJoinError;
use crate::handoff::{self, Navigator};
use crate::media::{Constraints, DeviceCatalog, MediaCapture, StreamHandle, StreamSession, Track};
use crate::meter::{AudioLevelMonitor, FrequencyAnalysis, LevelSamples, MonitorHandle};
use crate::models::{DeviceKind, HandoffRecord, Selection, ToggleState};
use crate::settings::MeterSettings;
use log::{debug, info, warn};

/// Pre-join device setup for one room
pub struct PreJoinPage<C: MediaCapture, A: FrequencyAnalysis, N: Navigator> {
    room_id: String,
    state: PageState,
    catalog: DeviceCatalog,
    selection: Selection,
    toggles: ToggleState,
    // Declared before the session so it also drops first
    monitor_handle: Option<MonitorHandle>,
    session: StreamSession<C>,
    analysis: A,
    monitor: AudioLevelMonitor,
    navigator: N,
    last_error: Option<PreJoinError>,
}

impl<C: MediaCapture, A: FrequencyAnalysis, N: Navigator> PreJoinPage<C, A, N> {
    pub fn new(
        room_id: impl Into<String>,
        capture: C,
        analysis: A,
        navigator: N,
        settings: MeterSettings,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            state: PageState::Idle,
            catalog: DeviceCatalog::default(),
            selection: Selection::default(),
            toggles: ToggleState::default(),
            monitor_handle: None,
            session: StreamSession::new(capture),
            analysis,
            monitor: AudioLevelMonitor::new(settings),
            navigator,
            last_error: None,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn catalog(&self) -> &DeviceCatalog {
        &self.catalog
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn toggles(&self) -> ToggleState {
        self.toggles
    }

    pub fn stream(&self) -> Option<&StreamHandle> {
        self.session.handle()
    }

    pub fn monitor(&self) -> Option<&MonitorHandle> {
        self.monitor_handle.as_ref()
    }

    /// Current meter reading, zero when nothing is sampling
    pub fn level(&self) -> f32 {
        self.monitor_handle.as_ref().map_or(0.0, MonitorHandle::level)
    }

    /// Subscribe to the running monitor's levels
    pub fn level_samples(&self) -> Option<LevelSamples> {
        self.monitor_handle.as_ref().map(MonitorHandle::samples)
    }

    /// Video track to show, if the camera is live and enabled
    pub fn preview_track(&self) -> Option<&Track> {
        if !self.toggles.video_enabled {
            return None;
        }
        self.session
            .handle()
            .and_then(|h| h.tracks_of(DeviceKind::VideoInput).next())
    }

    /// Most recent non-fatal error, cleared by the next successful preview
    pub fn last_error(&self) -> Option<&PreJoinError> {
        self.last_error.as_ref()
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Dispatch a page event
    pub async fn handle_event(&mut self, event: PageEvent) -> Result<(), PreJoinError> {
        debug!("Page event {:?} in state {}", event, self.state);
        match event {
            PageEvent::RequestPermission => self.request_devices().await,
            PageEvent::SelectionChanged { kind, device_id } => {
                self.select_device(kind, &device_id).await
            }
            PageEvent::TogglePressed(kind) => self.toggle(kind).map(|_| ()),
            PageEvent::JoinPressed => self.join().map(|_| ()),
            PageEvent::BackPressed => self.back(),
            PageEvent::Unmount => {
                self.unmount();
                Ok(())
            }
        }
    }

    /// Request permission, list devices, select defaults and start the
    /// preview
    pub async fn mount(&mut self) -> Result<(), PreJoinError> {
        self.request_devices().await
    }

    /// Ask for permission again after a denial, an enumeration failure or
    /// a failed acquisition. Already selected devices are kept when they
    /// are still present.
    pub async fn retry_permission(&mut self) -> Result<(), PreJoinError> {
        self.request_devices().await
    }

    async fn request_devices(&mut self) -> Result<(), PreJoinError> {
        // A preview whose last acquisition failed may list devices again
        let allowed = match self.state {
            PageState::Idle | PageState::Enumerated => true,
            PageState::Previewing => !self.session.is_live(),
            PageState::Joined | PageState::Aborted => false,
        };
        self.ensure(allowed, "request devices")?;

        let catalog =
            match DeviceCatalog::request_permission_and_enumerate(self.session.capture()).await {
                Ok(catalog) => catalog,
                Err(e) => return Err(self.surface(e.into())),
            };

        self.selection = match self.state {
            PageState::Idle => catalog.default_selection_pair(),
            _ => catalog.reconcile(&self.selection),
        };
        self.catalog = catalog;
        self.last_error = None;
        if self.state == PageState::Idle {
            self.transition(PageState::Enumerated);
        }

        self.reacquire().await
    }

    /// Switch the device of one kind, replacing the running preview
    pub async fn select_device(
        &mut self,
        kind: DeviceKind,
        device_id: &str,
    ) -> Result<(), PreJoinError> {
        self.ensure(self.state.has_devices(), "change devices")?;

        if self.catalog.find(kind, device_id).is_none() {
            return Err(self.surface(PreJoinError::UnknownDevice {
                kind,
                device_id: device_id.to_string(),
            }));
        }
        if self.selection.device_id(kind) == device_id && self.session.is_live() {
            debug!("{} {} already selected", kind, device_id);
            return Ok(());
        }

        info!("Selected {} {}", kind, device_id);
        self.selection.set_device_id(kind, device_id);
        self.reacquire().await
    }

    /// Stop monitor, release stream, acquire with the current selection,
    /// re-apply toggles, restart the monitor.
    async fn reacquire(&mut self) -> Result<(), PreJoinError> {
        self.stop_monitor();
        self.session.release();

        let constraints = Constraints::from_selection(
            &self.selection,
            self.catalog.has(DeviceKind::AudioInput),
            self.catalog.has(DeviceKind::VideoInput),
        );
        if !constraints.requests_anything() {
            info!("No capture devices available, preview skipped");
            return Ok(());
        }

        let acquired = self.session.acquire(&constraints).await.map(|_| ());
        if let Err(e) = acquired {
            return Err(self.surface(e.into()));
        }

        self.last_error = None;
        self.transition(PageState::Previewing);
        for &kind in DeviceKind::all() {
            // New tracks start enabled; keep what the user muted
            if !self.toggles.is_enabled(kind) {
                self.session.set_enabled(kind, false);
            }
        }
        if self.toggles.audio_enabled {
            self.start_monitor();
        }
        Ok(())
    }

    /// Flip one kind between enabled and disabled. Returns the new value.
    pub fn toggle(&mut self, kind: DeviceKind) -> Result<bool, PreJoinError> {
        let enabled = !self.toggles.is_enabled(kind);
        self.set_enabled(kind, enabled)?;
        Ok(enabled)
    }

    /// Enable or disable one kind without touching the device reservation
    pub fn set_enabled(&mut self, kind: DeviceKind, enabled: bool) -> Result<(), PreJoinError> {
        self.ensure(!self.state.is_terminal(), "toggle tracks")?;

        self.toggles.set_enabled(kind, enabled);
        let touched = self.session.set_enabled(kind, enabled);
        info!(
            "{} {} ({} live track(s))",
            kind,
            if enabled { "enabled" } else { "disabled" },
            touched
        );

        // A muted microphone keeps its monitor; one acquired while muted
        // gets its monitor on unmute
        if kind == DeviceKind::AudioInput && enabled && self.monitor_handle.is_none() {
            self.start_monitor();
        }
        Ok(())
    }

    /// Release everything and hand the configuration to the room
    pub fn join(&mut self) -> Result<HandoffRecord, PreJoinError> {
        self.ensure(self.state == PageState::Previewing, "join")?;

        self.teardown();
        let record = handoff::package(&self.room_id, &self.selection, self.toggles);
        self.transition(PageState::Joined);
        self.navigator.enter_room(&record);
        Ok(record)
    }

    /// Release everything and return to the entry screen
    pub fn back(&mut self) -> Result<(), PreJoinError> {
        self.ensure(!self.state.is_terminal(), "go back")?;

        self.teardown();
        self.transition(PageState::Aborted);
        self.navigator.return_home();
        Ok(())
    }

    /// Page is going away without navigating
    pub fn unmount(&mut self) {
        self.teardown();
        if !self.state.is_terminal() {
            self.transition(PageState::Aborted);
        }
    }

    fn start_monitor(&mut self) {
        let Some(handle) = self.session.handle() else {
            return;
        };
        if handle.audio_track().is_none() {
            return;
        }

        let stream_id = handle.id();
        let started = self.monitor.start(&self.analysis, handle);
        let monitor = match started {
            Ok(monitor) => monitor,
            Err(e) => {
                self.surface(e.into());
                MonitorHandle::silent(stream_id)
            }
        };
        self.monitor_handle = Some(monitor);
    }

    fn stop_monitor(&mut self) {
        if let Some(mut monitor) = self.monitor_handle.take() {
            monitor.stop();
        }
    }

    fn teardown(&mut self) {
        self.stop_monitor();
        self.session.release();
    }

    fn transition(&mut self, next: PageState) {
        if self.state != next {
            info!("Page {} -> {}", self.state, next);
            self.state = next;
        }
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), PreJoinError> {
        if allowed {
            return Ok(());
        }
        warn!("Rejected {} while {}", action, self.state);
        Err(PreJoinError::InvalidTransition {
            state: self.state,
            action,
        })
    }

    fn surface(&mut self, error: PreJoinError) -> PreJoinError {
        warn!("{}", error);
        self.last_error = Some(error.clone());
        error
    }
}

impl<C: MediaCapture, A: FrequencyAnalysis, N: Navigator> Drop for PreJoinPage<C, A, N> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use crate::media::{MediaCall, SimulatedMedia};
    use crate::models::Device;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct RecordingNavigator {
        entered: Vec<HandoffRecord>,
        returned_home: usize,
    }

    impl Navigator for RecordingNavigator {
        fn enter_room(&mut self, record: &HandoffRecord) {
            self.entered.push(record.clone());
        }

        fn return_home(&mut self) {
            self.returned_home += 1;
        }
    }

    type TestPage = PreJoinPage<SimulatedMedia, SimulatedMedia, RecordingNavigator>;

    fn media() -> SimulatedMedia {
        let media = SimulatedMedia::new().with_devices(vec![
            Device::new("a1", DeviceKind::AudioInput, "Mic"),
            Device::new("a2", DeviceKind::AudioInput, "Headset"),
            Device::new("v1", DeviceKind::VideoInput, "Cam"),
            Device::new("v2", DeviceKind::VideoInput, "Webcam"),
        ]);
        media.set_input_level("a1", 0.5);
        media.set_input_level("a2", 0.5);
        media
    }

    fn page(media: &SimulatedMedia) -> TestPage {
        PreJoinPage::new(
            "room-1",
            media.clone(),
            media.clone(),
            RecordingNavigator::default(),
            MeterSettings::default(),
        )
    }

    /// Collapses the journal into monitor/stream lifecycle steps. The
    /// per-track stops of one release count once.
    fn lifecycle(calls: &[MediaCall]) -> Vec<String> {
        let mut steps: Vec<String> = Vec::new();
        for call in calls {
            let step = match call {
                MediaCall::Detach { .. } => "stop".to_string(),
                MediaCall::StopTrack { .. } => "release".to_string(),
                MediaCall::Acquire(c) => format!(
                    "acquire({},{})",
                    c.audio_device_id.as_deref().unwrap_or(""),
                    c.video_device_id.as_deref().unwrap_or("")
                ),
                MediaCall::Attach { .. } => "start".to_string(),
                _ => continue,
            };
            if step == "release" && steps.last().map(String::as_str) == Some("release") {
                continue;
            }
            steps.push(step);
        }
        steps
    }

    fn count(media: &SimulatedMedia, pred: impl Fn(&MediaCall) -> bool) -> usize {
        media.journal().iter().filter(|c| pred(c)).count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_selects_defaults_and_previews() {
        let media = SimulatedMedia::new().with_devices(vec![
            Device::new("a1", DeviceKind::AudioInput, ""),
            Device::new("v1", DeviceKind::VideoInput, ""),
        ]);
        let mut page = page(&media);
        assert_eq!(page.state(), PageState::Idle);

        page.mount().await.unwrap();

        assert_eq!(page.selection(), &Selection::new("a1", "v1"));
        assert_eq!(page.state(), PageState::Previewing);
        assert!(media.journal().contains(&MediaCall::Acquire(Constraints {
            audio_device_id: Some("a1".to_string()),
            video_device_id: Some("v1".to_string()),
            audio_requested: true,
            video_requested: true,
        })));
        assert!(page.monitor().unwrap().is_running());
        assert!(page.preview_track().is_some());
        assert!(page.last_error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reselect_video_orders_steps() {
        let media = media();
        let mut page = page(&media);
        page.mount().await.unwrap();
        media.clear_journal();

        page.select_device(DeviceKind::VideoInput, "v2").await.unwrap();

        assert_eq!(
            lifecycle(&media.journal()),
            vec!["stop", "release", "acquire(a1,v2)", "start"]
        );
        assert_eq!(page.state(), PageState::Previewing);
        assert_eq!(page.stream().unwrap().device_id(DeviceKind::VideoInput), Some("v2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reselect_keeps_previewing_without_stream() {
        let media = media();
        let mut page = page(&media);
        page.mount().await.unwrap();
        media.set_busy("v2", true);

        let err = page
            .select_device(DeviceKind::VideoInput, "v2")
            .await
            .unwrap_err();

        assert!(matches!(err, PreJoinError::Media(MediaError::MediaAcquisition(_))));
        assert_eq!(page.state(), PageState::Previewing);
        assert!(page.stream().is_none());
        assert!(page.monitor().is_none());
        assert_eq!(page.level(), 0.0);
        assert_eq!(page.last_error(), Some(&err));
        assert_eq!(media.live_track_count(), 0);

        // Picking another device recovers
        page.select_device(DeviceKind::VideoInput, "v1").await.unwrap();
        assert!(page.stream().is_some());
        assert!(page.last_error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_stops_then_releases() {
        let media = media();
        let mut page = page(&media);
        page.mount().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        media.clear_journal();

        page.unmount();
        assert_eq!(lifecycle(&media.journal()), vec!["stop", "release"]);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count(&media, |c| matches!(c, MediaCall::Sample { .. })), 0);
        assert_eq!(media.stale_samples(), 0);
        assert_eq!(media.live_track_count(), 0);
        assert_eq!(page.state(), PageState::Aborted);
        assert_eq!(page.navigator().returned_home, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_reselection_never_overlaps() {
        let media = media();
        let mut page = page(&media);
        page.mount().await.unwrap();

        let picks = [
            (DeviceKind::VideoInput, "v2"),
            (DeviceKind::AudioInput, "a2"),
            (DeviceKind::VideoInput, "v1"),
            (DeviceKind::AudioInput, "a1"),
            (DeviceKind::VideoInput, "v2"),
        ];
        for (kind, id) in picks {
            page.select_device(kind, id).await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let acquires = count(&media, |c| matches!(c, MediaCall::Acquire(_)));
        let steps = lifecycle(&media.journal());
        let releases = steps.iter().filter(|s| *s == "release").count();
        assert_eq!(acquires, picks.len() + 1);
        assert_eq!(releases, acquires - 1);
        assert_eq!(media.overlapping_acquisitions(), 0);
        assert_eq!(media.stale_samples(), 0);

        // Every release is preceded by the monitor stop
        for (i, step) in steps.iter().enumerate() {
            if step == "release" {
                assert_eq!(steps[i - 1], "stop");
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_keeps_reservation() {
        let media = media();
        let mut page = page(&media);
        page.mount().await.unwrap();
        let stream_id = page.stream().unwrap().id();
        media.clear_journal();

        assert!(!page.toggle(DeviceKind::VideoInput).unwrap());
        assert!(page.toggle(DeviceKind::VideoInput).unwrap());
        assert!(!page.toggle(DeviceKind::AudioInput).unwrap());

        assert_eq!(page.stream().unwrap().id(), stream_id);
        assert!(media
            .journal()
            .iter()
            .all(|c| matches!(c, MediaCall::SetEnabled { .. } | MediaCall::Sample { .. })));
        assert!(!page.toggles().audio_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_muted_microphone_keeps_sampling_silence() {
        let media = media();
        let mut page = page(&media);
        page.mount().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(page.level() > 0.0);

        page.toggle(DeviceKind::AudioInput).unwrap();
        // Let the smoothing history decay
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(page.monitor().unwrap().is_running());
        assert!(page.level() < 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggles_survive_reselection() {
        let media = media();
        let mut page = page(&media);
        page.mount().await.unwrap();
        page.toggle(DeviceKind::AudioInput).unwrap();
        page.toggle(DeviceKind::VideoInput).unwrap();

        page.select_device(DeviceKind::AudioInput, "a2").await.unwrap();

        let stream = page.stream().unwrap();
        for track in stream.tracks() {
            assert!(!track.is_enabled());
            assert_eq!(media.is_track_enabled(track.id()), Some(false));
        }
        assert!(page.monitor().is_none());
        assert!(page.preview_track().is_none());

        // Unmuting starts the monitor that was skipped while muted
        page.toggle(DeviceKind::AudioInput).unwrap();
        assert!(page.monitor().unwrap().is_running());
        assert!(page.stream().unwrap().audio_track().unwrap().is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_failure_reads_zero() {
        let media = media();
        media.fail_analysis(true);
        let mut page = page(&media);

        page.mount().await.unwrap();

        assert_eq!(page.state(), PageState::Previewing);
        assert!(matches!(
            page.last_error(),
            Some(PreJoinError::Media(MediaError::AnalysisAttach(_)))
        ));
        let monitor = page.monitor().unwrap();
        assert!(!monitor.is_running());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(page.level(), 0.0);
    }

    #[tokio::test]
    async fn test_permission_denied_then_retry() {
        let media = media().deny_permission();
        let mut page = page(&media);

        let err = page.mount().await.unwrap_err();
        assert!(matches!(err, PreJoinError::Media(MediaError::PermissionDenied(_))));
        assert_eq!(page.state(), PageState::Idle);
        assert!(page.catalog().is_empty());
        assert!(page.last_error().is_some());

        media.set_permission_denied(false);
        page.retry_permission().await.unwrap();
        assert_eq!(page.state(), PageState::Previewing);
        assert_eq!(page.selection(), &Selection::new("a1", "v1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_failed_reselection() {
        let media = media();
        let mut page = page(&media);
        page.mount().await.unwrap();

        // Not while the preview is live
        assert!(matches!(
            page.retry_permission().await,
            Err(PreJoinError::InvalidTransition { state: PageState::Previewing, .. })
        ));

        media.set_busy("v2", true);
        assert!(page.select_device(DeviceKind::VideoInput, "v2").await.is_err());
        assert!(page.stream().is_none());

        media.set_busy("v2", false);
        media.clear_journal();
        page.retry_permission().await.unwrap();

        assert_eq!(media.journal()[0], MediaCall::RequestPermission);
        assert_eq!(page.state(), PageState::Previewing);
        assert_eq!(page.selection(), &Selection::new("a1", "v2"));
        assert_eq!(page.stream().unwrap().device_id(DeviceKind::VideoInput), Some("v2"));
        assert!(page.monitor().unwrap().is_running());
        assert!(page.last_error().is_none());
        assert_eq!(media.overlapping_acquisitions(), 0);
    }

    #[tokio::test]
    async fn test_initial_acquire_failure_stays_enumerated() {
        let media = media();
        media.set_busy("v1", true);
        let mut page = page(&media);

        assert!(page.mount().await.is_err());
        assert_eq!(page.state(), PageState::Enumerated);

        assert!(matches!(
            page.join(),
            Err(PreJoinError::InvalidTransition { state: PageState::Enumerated, .. })
        ));

        page.select_device(DeviceKind::VideoInput, "v2").await.unwrap();
        assert_eq!(page.state(), PageState::Previewing);
    }

    #[tokio::test]
    async fn test_back_from_enumerated() {
        let media = media();
        media.set_busy("v1", true);
        let mut page = page(&media);
        let _ = page.mount().await;

        page.back().unwrap();
        assert_eq!(page.state(), PageState::Aborted);
        assert_eq!(page.navigator().returned_home, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_hands_off_and_releases() {
        let media = media();
        let mut page = page(&media);
        page.mount().await.unwrap();
        page.select_device(DeviceKind::AudioInput, "a2").await.unwrap();
        page.toggle(DeviceKind::VideoInput).unwrap();
        media.clear_journal();

        let record = page.join().unwrap();

        assert_eq!(record.room_id(), "room-1");
        assert_eq!(record.audio_device_id(), "a2");
        assert_eq!(record.video_device_id(), "v1");
        assert!(record.audio_enabled());
        assert!(!record.video_enabled());
        assert_eq!(page.navigator().entered, vec![record]);
        assert_eq!(lifecycle(&media.journal()), vec!["stop", "release"]);
        assert_eq!(media.live_track_count(), 0);
        assert_eq!(page.state(), PageState::Joined);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_state_rejects_actions() {
        let media = media();
        let mut page = page(&media);
        page.mount().await.unwrap();
        page.join().unwrap();
        media.clear_journal();

        assert!(page.select_device(DeviceKind::VideoInput, "v2").await.is_err());
        assert!(page.toggle(DeviceKind::AudioInput).is_err());
        assert!(page.back().is_err());
        assert!(page.join().is_err());
        assert!(page.retry_permission().await.is_err());
        page.unmount();

        assert!(media.journal().is_empty());
        assert_eq!(page.state(), PageState::Joined);
        assert_eq!(page.navigator().returned_home, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_selection_edge_cases() {
        let media = media();
        let mut page = page(&media);
        page.mount().await.unwrap();
        media.clear_journal();

        page.select_device(DeviceKind::AudioInput, "a1").await.unwrap();
        assert_eq!(count(&media, |c| matches!(c, MediaCall::Acquire(_))), 0);

        let err = page
            .select_device(DeviceKind::AudioInput, "v1")
            .await
            .unwrap_err();
        assert!(matches!(err, PreJoinError::UnknownDevice { .. }));
        assert_eq!(page.selection(), &Selection::new("a1", "v1"));
        assert!(page.stream().is_some());
    }

    #[tokio::test]
    async fn test_no_devices_skips_preview() {
        let media = SimulatedMedia::new();
        let mut page = page(&media);

        page.mount().await.unwrap();

        assert_eq!(page.state(), PageState::Enumerated);
        assert_eq!(page.selection(), &Selection::default());
        assert_eq!(count(&media, |c| matches!(c, MediaCall::Acquire(_))), 0);
    }

    #[tokio::test]
    async fn test_camera_only_preview_has_no_monitor() {
        let media = SimulatedMedia::new().with_devices(vec![Device::new(
            "v1",
            DeviceKind::VideoInput,
            "Cam",
        )]);
        let mut page = page(&media);

        page.mount().await.unwrap();

        assert_eq!(page.state(), PageState::Previewing);
        assert!(page.monitor().is_none());
        assert!(page.last_error().is_none());
        assert_eq!(page.selection(), &Selection::new("", "v1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_drive_the_page() {
        let media = media();
        let mut page = page(&media);

        page.handle_event(PageEvent::RequestPermission).await.unwrap();
        page.handle_event(PageEvent::SelectionChanged {
            kind: DeviceKind::VideoInput,
            device_id: "v2".to_string(),
        })
        .await
        .unwrap();
        page.handle_event(PageEvent::TogglePressed(DeviceKind::AudioInput))
            .await
            .unwrap();
        page.handle_event(PageEvent::JoinPressed).await.unwrap();

        let record = &page.navigator().entered[0];
        assert_eq!(record.video_device_id(), "v2");
        assert!(!record.audio_enabled());

        assert!(page.handle_event(PageEvent::BackPressed).await.is_err());
        page.handle_event(PageEvent::Unmount).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_everything() {
        let media = media();
        {
            let mut page = page(&media);
            page.mount().await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        media.clear_journal();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(media.live_track_count(), 0);
        assert_eq!(count(&media, |c| matches!(c, MediaCall::Sample { .. })), 0);
    }
}
