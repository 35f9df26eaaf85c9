//! Capture backend on PipeWire
//!
//! Every track runs its own PipeWire main loop on a dedicated thread.
//! A track counts as opened once its stream has negotiated a format and
//! reached the paused or streaming state. Microphone tracks keep the most
//! recent window of mono samples for the level meter; camera tracks
//! negotiate raw video, hold the device and discard frames.

use super::{Constraints, MediaCapture, Track, TrackInfo};
use crate::error::MediaError;
use crate::meter::{Analyser, FrequencyAnalysis, SpectrumAnalyser};
use crate::models::{Device, DeviceKind};
use log::{debug, info, warn};
use pipewire as pw;
use pw::spa;
use pw::spa::param::format::{MediaSubtype, MediaType};
use pw::spa::param::format_utils;
use pw::spa::pod::Pod;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

const AUDIO_SOURCE_CLASS: &str = "Audio/Source";
const VIDEO_SOURCE_CLASS: &str = "Video/Source";

/// How long a stream may take to negotiate before acquisition fails
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Reports the outcome of a stream's negotiation back to `open_track`
type ReadySlot = Rc<RefCell<Option<oneshot::Sender<Result<(), String>>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// A capture node as listed by the registry
#[derive(Debug, Clone)]
struct Node {
    name: String,
    description: String,
    kind: DeviceKind,
}

/// Most recent mono samples of a microphone, oldest first
#[derive(Debug)]
struct SampleWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SampleWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn extend(&mut self, samples: impl IntoIterator<Item = f32>) {
        for sample in samples {
            if self.samples.len() == self.capacity {
                self.samples.pop_front();
            }
            self.samples.push_back(sample);
        }
    }

    /// Copy the newest samples into `out`, padding the front with silence
    fn latest(&self, out: &mut [f32]) {
        let n = self.samples.len().min(out.len());
        let pad = out.len() - n;
        out[..pad].fill(0.0);
        let skip = self.samples.len() - n;
        for (slot, sample) in out[pad..].iter_mut().zip(self.samples.iter().skip(skip)) {
            *slot = *sample;
        }
    }
}

enum PipeWireCommand {
    Stop,
}

/// One open PipeWire stream and the thread running it
struct TrackWorker {
    kind: DeviceKind,
    node_name: String,
    enabled: Arc<AtomicBool>,
    samples: Option<Arc<Mutex<SampleWindow>>>,
    sender: pw::channel::Sender<PipeWireCommand>,
    thread: Option<JoinHandle<()>>,
}

impl TrackWorker {
    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.sender.send(PipeWireCommand::Stop);
        let _ = thread.join();
        debug!("Closed PipeWire stream on {}", self.node_name);
    }
}

impl Drop for TrackWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Inner {
    fft_size: usize,
    smoothing: f32,
    tracks: Mutex<HashMap<String, TrackWorker>>,
}

/// Capture platform backed by the PipeWire daemon. Clones share tracks.
#[derive(Clone)]
pub struct PipeWireMedia {
    inner: Arc<Inner>,
}

impl PipeWireMedia {
    /// Initialize PipeWire and check that the daemon answers
    pub fn connect(fft_size: usize, smoothing: f32) -> Result<Self, MediaError> {
        pw::init();
        let nodes = list_nodes().map_err(MediaError::DeviceEnumeration)?;
        info!("Connected to PipeWire, {} capture node(s)", nodes.len());

        Ok(Self {
            inner: Arc::new(Inner {
                fft_size,
                smoothing,
                tracks: Mutex::new(HashMap::new()),
            }),
        })
    }

    fn tracks(&self) -> MutexGuard<'_, HashMap<String, TrackWorker>> {
        lock(&self.inner.tracks)
    }

    async fn nodes(&self) -> Result<Vec<Node>, String> {
        match tokio::task::spawn_blocking(list_nodes).await {
            Ok(nodes) => nodes,
            Err(e) => Err(format!("Registry listing task failed: {}", e)),
        }
    }
}

impl MediaCapture for PipeWireMedia {
    async fn request_permission(&self) -> Result<(), MediaError> {
        // Access is granted per session; an unreachable daemon is a refusal
        self.nodes()
            .await
            .map(|_| ())
            .map_err(MediaError::PermissionDenied)
    }

    async fn enumerate_devices(&self) -> Result<Vec<Device>, MediaError> {
        let nodes = self.nodes().await.map_err(MediaError::DeviceEnumeration)?;
        Ok(nodes
            .into_iter()
            .map(|node| Device::new(node.name, node.kind, node.description))
            .collect())
    }

    async fn acquire(&self, constraints: &Constraints) -> Result<Vec<TrackInfo>, MediaError> {
        let nodes = self.nodes().await.map_err(MediaError::MediaAcquisition)?;

        let mut picks = Vec::new();
        for &kind in DeviceKind::all() {
            if !constraints.is_requested(kind) {
                continue;
            }
            let wanted = constraints.device_id(kind);
            let node = nodes
                .iter()
                .find(|n| n.kind == kind && wanted.map_or(true, |id| n.name == id))
                .ok_or_else(|| {
                    MediaError::MediaAcquisition(format!("No {} matching {:?}", kind, wanted))
                })?;
            let held = self.tracks().values().any(|t| t.node_name == node.name);
            if held {
                return Err(MediaError::MediaAcquisition(format!(
                    "{} {} is busy",
                    kind, node.name
                )));
            }
            picks.push(node.clone());
        }
        if picks.is_empty() {
            return Err(MediaError::MediaAcquisition(
                "no track kinds requested".to_string(),
            ));
        }

        // Workers opened so far are closed on drop if a later one fails
        let mut opened = Vec::with_capacity(picks.len());
        for node in &picks {
            let worker = open_track(node, self.inner.fft_size).await?;
            opened.push((Uuid::new_v4().to_string(), worker));
        }

        let mut tracks = self.tracks();
        let infos = opened
            .into_iter()
            .map(|(id, worker)| {
                let info = TrackInfo {
                    id: id.clone(),
                    kind: worker.kind,
                    device_id: worker.node_name.clone(),
                };
                tracks.insert(id, worker);
                info
            })
            .collect();
        Ok(infos)
    }

    fn stop_track(&self, track_id: &str) {
        let worker = self.tracks().remove(track_id);
        if let Some(mut worker) = worker {
            worker.stop();
        }
    }

    fn set_track_enabled(&self, track_id: &str, enabled: bool) {
        if let Some(worker) = self.tracks().get(track_id) {
            worker.enabled.store(enabled, Ordering::SeqCst);
        }
    }
}

impl FrequencyAnalysis for PipeWireMedia {
    type Analyser = PipeWireAnalyser;

    fn attach(&self, track: &Track) -> Result<PipeWireAnalyser, MediaError> {
        let samples = self
            .tracks()
            .get(track.id())
            .and_then(|worker| worker.samples.clone())
            .ok_or_else(|| {
                MediaError::AnalysisAttach(format!(
                    "track {} is not a live audio track",
                    track.id()
                ))
            })?;

        let spectrum = SpectrumAnalyser::new(self.inner.fft_size, self.inner.smoothing);
        Ok(PipeWireAnalyser {
            samples: Some(samples),
            frame: vec![0.0; spectrum.fft_size()],
            spectrum,
        })
    }
}

/// Spectrum over a PipeWire microphone's latest samples
pub struct PipeWireAnalyser {
    samples: Option<Arc<Mutex<SampleWindow>>>,
    spectrum: SpectrumAnalyser,
    frame: Vec<f32>,
}

impl Analyser for PipeWireAnalyser {
    fn frequency_bin_count(&self) -> usize {
        self.spectrum.bin_count()
    }

    fn byte_frequency_data(&mut self, bins: &mut [u8]) {
        match &self.samples {
            Some(samples) => lock(samples).latest(&mut self.frame),
            None => self.frame.fill(0.0),
        }
        self.spectrum.process(&self.frame, bins);
    }

    fn detach(&mut self) {
        if self.samples.take().is_some() {
            debug!("Detached PipeWire analyser");
        }
    }
}

/// List audio and video capture nodes with a registry roundtrip
fn list_nodes() -> Result<Vec<Node>, String> {
    let mainloop = pw::main_loop::MainLoopRc::new(None)
        .map_err(|e| format!("Failed to create PipeWire main loop: {}", e))?;

    let context = pw::context::ContextRc::new(&mainloop, None)
        .map_err(|e| format!("Failed to create PipeWire context: {}", e))?;

    let core = context
        .connect_rc(None)
        .map_err(|e| format!("Failed to connect to PipeWire: {}", e))?;

    let registry = core
        .get_registry()
        .map_err(|e| format!("Failed to get PipeWire registry: {}", e))?;

    let nodes = Rc::new(RefCell::new(Vec::new()));
    let _registry_listener = registry
        .add_listener_local()
        .global({
            let nodes = nodes.clone();
            move |global| {
                if global.type_ != pw::types::ObjectType::Node {
                    return;
                }
                let Some(props) = global.props else { return };
                let kind = match props.get(*pw::keys::MEDIA_CLASS) {
                    Some(AUDIO_SOURCE_CLASS) => DeviceKind::AudioInput,
                    Some(VIDEO_SOURCE_CLASS) => DeviceKind::VideoInput,
                    _ => return,
                };
                let Some(name) = props.get(*pw::keys::NODE_NAME) else {
                    return;
                };
                let description = props
                    .get(*pw::keys::NODE_DESCRIPTION)
                    .or_else(|| props.get(*pw::keys::NODE_NICK))
                    .unwrap_or_default();
                nodes.borrow_mut().push(Node {
                    name: name.to_string(),
                    description: description.to_string(),
                    kind,
                });
            }
        })
        .register();

    // Quit once the server has answered everything queued before the sync
    let pending = core
        .sync(0)
        .map_err(|e| format!("Failed to sync with PipeWire: {}", e))?;
    let mainloop_weak = mainloop.downgrade();
    let _core_listener = core
        .add_listener_local()
        .done(move |id, seq| {
            if id == pw::core::PW_ID_CORE && seq == pending {
                if let Some(mainloop) = mainloop_weak.upgrade() {
                    mainloop.quit();
                }
            }
        })
        .register();

    mainloop.run();

    let listed = nodes.borrow().clone();
    debug!("PipeWire registry lists {} capture node(s)", listed.len());
    Ok(listed)
}

/// Start a stream thread on `node` and wait until it is connected
async fn open_track(node: &Node, window: usize) -> Result<TrackWorker, MediaError> {
    let enabled = Arc::new(AtomicBool::new(true));
    let samples = (node.kind == DeviceKind::AudioInput)
        .then(|| Arc::new(Mutex::new(SampleWindow::new(window))));

    let (sender, receiver) = pw::channel::channel::<PipeWireCommand>();
    let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();

    let thread = {
        let node = node.clone();
        let enabled = enabled.clone();
        let samples = samples.clone();
        thread::Builder::new()
            .name(format!("pw-{}", node.kind.display_name().to_lowercase()))
            .spawn(move || {
                let ready: ReadySlot = Rc::new(RefCell::new(Some(ready_tx)));
                if let Err(e) = run_stream_loop(&node, enabled, samples, receiver, ready.clone()) {
                    let pending = ready.borrow_mut().take();
                    match pending {
                        Some(ready) => {
                            let _ = ready.send(Err(e));
                        }
                        None => warn!("PipeWire stream on {} ended: {}", node.name, e),
                    }
                }
            })
            .map_err(|e| {
                MediaError::MediaAcquisition(format!("Failed to spawn capture thread: {}", e))
            })?
    };

    let mut worker = TrackWorker {
        kind: node.kind,
        node_name: node.name.clone(),
        enabled,
        samples,
        sender,
        thread: Some(thread),
    };

    let outcome = match tokio::time::timeout(CONNECT_TIMEOUT, ready_rx).await {
        Ok(outcome) => outcome,
        Err(_) => {
            worker.stop();
            return Err(MediaError::MediaAcquisition(format!(
                "{} {} did not start within {:?}",
                node.kind, node.name, CONNECT_TIMEOUT
            )));
        }
    };
    match outcome {
        Ok(Ok(())) => {
            info!("Opened {} {}", node.kind, node.name);
            Ok(worker)
        }
        Ok(Err(e)) => {
            worker.stop();
            Err(MediaError::MediaAcquisition(e))
        }
        Err(_) => {
            worker.stop();
            Err(MediaError::MediaAcquisition(format!(
                "Capture thread for {} exited before connecting",
                node.name
            )))
        }
    }
}

/// Run one PipeWire stream in the current thread until stopped
fn run_stream_loop(
    node: &Node,
    enabled: Arc<AtomicBool>,
    samples: Option<Arc<Mutex<SampleWindow>>>,
    receiver: pw::channel::Receiver<PipeWireCommand>,
    ready: ReadySlot,
) -> Result<(), String> {
    let mainloop = pw::main_loop::MainLoopRc::new(None)
        .map_err(|e| format!("Failed to create PipeWire main loop: {}", e))?;

    let context = pw::context::ContextRc::new(&mainloop, None)
        .map_err(|e| format!("Failed to create PipeWire context: {}", e))?;

    let core = context
        .connect_rc(None)
        .map_err(|e| format!("Failed to connect to PipeWire: {}", e))?;

    // Set up channel receiver to stop the loop
    let mainloop_weak = mainloop.downgrade();
    let _receiver = receiver.attach(mainloop.loop_(), move |cmd| match cmd {
        PipeWireCommand::Stop => {
            if let Some(mainloop) = mainloop_weak.upgrade() {
                mainloop.quit();
            }
        }
    });

    struct StreamData {
        format: spa::param::audio::AudioInfoRaw,
        enabled: Arc<AtomicBool>,
        samples: Option<Arc<Mutex<SampleWindow>>>,
    }

    let is_audio = node.kind == DeviceKind::AudioInput;
    let data = StreamData {
        format: Default::default(),
        enabled,
        samples,
    };

    let props = pw::properties::properties! {
        *pw::keys::MEDIA_TYPE => if is_audio { "Audio" } else { "Video" },
        *pw::keys::MEDIA_CATEGORY => "Capture",
        *pw::keys::MEDIA_ROLE => "Communication",
        *pw::keys::APP_NAME => "Prejoin",
        *pw::keys::TARGET_OBJECT => node.name.as_str(),
    };

    let stream = pw::stream::StreamBox::new(&core, "prejoin-capture", props)
        .map_err(|e| format!("Failed to create PipeWire stream: {}", e))?;

    let mainloop_weak = mainloop.downgrade();
    let _listener = stream
        .add_local_listener_with_user_data(data)
        .state_changed(move |_, _, old, new| {
            debug!("PipeWire stream state {:?} -> {:?}", old, new);
            let failed = matches!(new, pw::stream::StreamState::Error(_));
            if let Some(outcome) = readiness(&new) {
                let pending = ready.borrow_mut().take();
                match pending {
                    Some(sender) => {
                        let _ = sender.send(outcome);
                    }
                    None if failed => warn!("PipeWire stream failed: {:?}", new),
                    None => {}
                }
            }
            if failed {
                if let Some(mainloop) = mainloop_weak.upgrade() {
                    mainloop.quit();
                }
            }
        })
        .param_changed(|_, data, id, param| {
            let Some(param) = param else { return };
            if data.samples.is_none() || id != spa::param::ParamType::Format.as_raw() {
                return;
            }

            let (media_type, media_subtype) = match format_utils::parse_format(param) {
                Ok(v) => v,
                Err(_) => return,
            };
            if media_type != MediaType::Audio || media_subtype != MediaSubtype::Raw {
                return;
            }

            if let Err(e) = data.format.parse(param) {
                warn!("Failed to parse audio format: {:?}", e);
            }
        })
        .process(|stream, data| {
            let Some(mut buffer) = stream.dequeue_buffer() else {
                return;
            };
            // Camera frames are only drained
            let Some(window) = &data.samples else { return };

            let datas = buffer.datas_mut();
            if datas.is_empty() {
                return;
            }

            let chunk = &mut datas[0];
            let n_channels = data.format.channels().max(1) as usize;
            let size = chunk.chunk().size() as usize;
            let Some(raw) = chunk.data() else { return };

            // First channel only
            let frame_bytes = n_channels * std::mem::size_of::<f32>();
            let mono = raw[..size.min(raw.len())]
                .chunks_exact(frame_bytes)
                .map(|frame| f32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]));

            // Disabled tracks deliver silence
            let live = data.enabled.load(Ordering::Relaxed);
            lock(window).extend(mono.map(|s| if live { s } else { 0.0 }));
        })
        .register()
        .map_err(|e| format!("Failed to register stream listener: {}", e))?;

    let format_bytes = if is_audio {
        audio_format_pod()?
    } else {
        video_format_pod()?
    };
    let mut params = [Pod::from_bytes(&format_bytes).ok_or("Invalid format pod")?];

    stream
        .connect(
            spa::utils::Direction::Input,
            None,
            pw::stream::StreamFlags::AUTOCONNECT
                | pw::stream::StreamFlags::MAP_BUFFERS
                | pw::stream::StreamFlags::RT_PROCESS,
            &mut params,
        )
        .map_err(|e| format!("Failed to connect stream: {}", e))?;

    // Run until stopped or failed
    mainloop.run();

    Ok(())
}

/// Whether a state change settles a pending acquisition, and how
fn readiness(state: &pw::stream::StreamState) -> Option<Result<(), String>> {
    match state {
        pw::stream::StreamState::Paused | pw::stream::StreamState::Streaming => Some(Ok(())),
        pw::stream::StreamState::Error(message) => {
            Some(Err(format!("PipeWire stream error: {}", message)))
        }
        _ => None,
    }
}

/// Raw video in the common camera formats, any size and rate
fn video_format_pod() -> Result<Vec<u8>, String> {
    use spa::param::format::FormatProperties;
    use spa::param::video::VideoFormat;
    use spa::utils::{Fraction, Rectangle};

    let obj = spa::pod::object!(
        spa::utils::SpaTypes::ObjectParamFormat,
        spa::param::ParamType::EnumFormat,
        spa::pod::property!(FormatProperties::MediaType, Id, MediaType::Video),
        spa::pod::property!(FormatProperties::MediaSubtype, Id, MediaSubtype::Raw),
        spa::pod::property!(
            FormatProperties::VideoFormat,
            Choice,
            Enum,
            Id,
            VideoFormat::YUY2,
            VideoFormat::YUY2,
            VideoFormat::I420,
            VideoFormat::NV12,
            VideoFormat::RGBx,
            VideoFormat::BGRx,
            VideoFormat::RGB
        ),
        spa::pod::property!(
            FormatProperties::VideoSize,
            Choice,
            Range,
            Rectangle,
            Rectangle {
                width: 640,
                height: 480
            },
            Rectangle {
                width: 1,
                height: 1
            },
            Rectangle {
                width: 4096,
                height: 4096
            }
        ),
        spa::pod::property!(
            FormatProperties::VideoFramerate,
            Choice,
            Range,
            Fraction,
            Fraction { num: 30, denom: 1 },
            Fraction { num: 0, denom: 1 },
            Fraction { num: 1000, denom: 1 }
        ),
    );

    let values = spa::pod::serialize::PodSerializer::serialize(
        std::io::Cursor::new(Vec::new()),
        &spa::pod::Value::Object(obj),
    )
    .map_err(|e| format!("Failed to serialize video format: {:?}", e))?
    .0
    .into_inner();
    Ok(values)
}

/// F32LE at the node's native rate
fn audio_format_pod() -> Result<Vec<u8>, String> {
    let mut audio_info = spa::param::audio::AudioInfoRaw::new();
    audio_info.set_format(spa::param::audio::AudioFormat::F32LE);

    let obj = spa::pod::Object {
        type_: spa::utils::SpaTypes::ObjectParamFormat.as_raw(),
        id: spa::param::ParamType::EnumFormat.as_raw(),
        properties: audio_info.into(),
    };

    let values = spa::pod::serialize::PodSerializer::serialize(
        std::io::Cursor::new(Vec::new()),
        &spa::pod::Value::Object(obj),
    )
    .map_err(|e| format!("Failed to serialize audio format: {:?}", e))?
    .0
    .into_inner();
    Ok(values)
}
