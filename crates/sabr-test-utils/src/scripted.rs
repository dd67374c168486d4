//! Native session driven by a script of poll results.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;
use sabr_manifest::{FormatId, Representation};
use sabr_stream::{DemuxError, NativeDemux, PollBatch, SessionParams};

#[derive(Default)]
struct RecorderState {
    initialized: Option<SessionParams>,
    polls: usize,
    selected: Vec<FormatId>,
    destroys: usize,
}

/// Shared view of the calls a [`ScriptedDemux`] received.
///
/// Clone it before handing the demuxer to a session.
#[derive(Clone, Default)]
pub struct DemuxRecorder {
    state: Arc<Mutex<RecorderState>>,
}

impl DemuxRecorder {
    pub fn polls(&self) -> usize {
        self.state.lock().polls
    }

    pub fn selected_formats(&self) -> Vec<FormatId> {
        self.state.lock().selected.clone()
    }

    pub fn destroys(&self) -> usize {
        self.state.lock().destroys
    }

    pub fn initialized_with(&self) -> Option<SessionParams> {
        self.state.lock().initialized.clone()
    }
}

/// Replays scripted poll results; an exhausted script reports end of stream.
#[derive(Default)]
pub struct ScriptedDemux {
    script: VecDeque<Result<PollBatch, DemuxError>>,
    initialize_error: Option<DemuxError>,
    select_error: Option<DemuxError>,
    recorder: DemuxRecorder,
}

impl ScriptedDemux {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_batch(mut self, batch: PollBatch) -> Self {
        self.script.push_back(Ok(batch));
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: DemuxError) -> Self {
        self.script.push_back(Err(error));
        self
    }

    #[must_use]
    pub fn with_initialize_error(mut self, error: DemuxError) -> Self {
        self.initialize_error = Some(error);
        self
    }

    #[must_use]
    pub fn with_select_error(mut self, error: DemuxError) -> Self {
        self.select_error = Some(error);
        self
    }

    pub fn recorder(&self) -> DemuxRecorder {
        self.recorder.clone()
    }
}

impl NativeDemux for ScriptedDemux {
    type Handle = u64;

    fn initialize(&mut self, params: &SessionParams) -> Result<u64, DemuxError> {
        if let Some(error) = self.initialize_error.take() {
            return Err(error);
        }
        self.recorder.state.lock().initialized = Some(params.clone());
        Ok(1)
    }

    fn poll(&mut self, _handle: &mut u64) -> Result<PollBatch, DemuxError> {
        self.recorder.state.lock().polls += 1;
        self.script
            .pop_front()
            .unwrap_or_else(|| Ok(PollBatch::default()))
    }

    fn select_format(
        &mut self,
        _handle: &mut u64,
        representation: &Representation,
    ) -> Result<(), DemuxError> {
        if let Some(error) = self.select_error.take() {
            return Err(error);
        }
        self.recorder
            .state
            .lock()
            .selected
            .push(representation.format_id.clone());
        Ok(())
    }

    fn destroy(&mut self, _handle: u64) {
        self.recorder.state.lock().destroys += 1;
    }
}
