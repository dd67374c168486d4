use sabr_manifest::Representation;

use crate::{NativeDemux, PollBatch, SessionError, SessionParams, SessionResult};

/// Owned native session handle.
///
/// Every call checks the closed flag. `destroy` succeeds exactly once; a
/// second call is an error. Dropping a live session destroys it.
pub struct StreamSession<D: NativeDemux> {
    demux: D,
    handle: Option<D::Handle>,
    session_id: String,
}

impl<D: NativeDemux> StreamSession<D> {
    pub fn initialize(mut demux: D, params: &SessionParams) -> SessionResult<Self> {
        let handle = demux.initialize(params)?;
        tracing::debug!(
            session_id = %params.session_id,
            audio = ?params.audio,
            video = ?params.video,
            "native session created"
        );
        Ok(Self {
            demux,
            handle: Some(handle),
            session_id: params.session_id.clone(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    pub fn poll(&mut self) -> SessionResult<PollBatch> {
        let handle = self.handle.as_mut().ok_or(SessionError::Destroyed)?;
        Ok(self.demux.poll(handle)?)
    }

    pub fn select_format(&mut self, representation: &Representation) -> SessionResult<()> {
        let handle = self.handle.as_mut().ok_or(SessionError::Destroyed)?;
        self.demux.select_format(handle, representation)?;
        tracing::debug!(
            track = %representation.track_type(),
            format = %representation.format_id,
            "format selected"
        );
        Ok(())
    }

    pub fn destroy(&mut self) -> SessionResult<()> {
        let handle = self.handle.take().ok_or(SessionError::AlreadyDestroyed)?;
        self.demux.destroy(handle);
        tracing::debug!(session_id = %self.session_id, "native session destroyed");
        Ok(())
    }
}

impl<D: NativeDemux> Drop for StreamSession<D> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::warn!(session_id = %self.session_id, "session dropped without destroy");
            self.demux.destroy(handle);
        }
    }
}
