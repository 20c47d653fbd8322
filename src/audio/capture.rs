//! Capture-device collaborator.
//!
//! The capture handle is exclusively owned by the audio pipeline; no other
//! component touches it. A session records one bounded segment at a time:
//! `start_segment` opens it, `stop_segment` closes it and yields the
//! encoded bytes. At most one segment may be open per session.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Capture hardware errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("capture device error: {0}")]
    Device(String),
}

/// Grants access to recording hardware.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Acquire the device, prompting for permission if needed.
    async fn acquire(&self) -> Result<Box<dyn CaptureSession>, CaptureError>;
}

/// One acquired recording handle.
#[async_trait]
pub trait CaptureSession: Send {
    /// Open a new segment. Fails if a segment is already open.
    async fn start_segment(&mut self) -> Result<(), CaptureError>;

    /// Close the open segment and return its encoded bytes.
    /// Fails if no segment is open.
    async fn stop_segment(&mut self) -> Result<Vec<u8>, CaptureError>;

    /// Stop any open segment and release the hardware.
    async fn release(&mut self);
}

// ============================================================================
// Simulated device (tests / demo)
// ============================================================================

/// In-memory capture device. Each closed segment yields the next scripted
/// chunk, or an empty buffer once the script runs out.
pub struct SimulatedDevice {
    deny_permission: bool,
    chunks: Mutex<VecDeque<Vec<u8>>>,
}

impl SimulatedDevice {
    /// Device that grants permission and yields the given segment chunks.
    pub fn with_chunks(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            deny_permission: false,
            chunks: Mutex::new(chunks.into()),
        }
    }

    /// Device that always denies the permission prompt.
    pub fn denied() -> Self {
        Self {
            deny_permission: true,
            chunks: Mutex::new(VecDeque::new()),
        }
    }
}

#[async_trait]
impl CaptureDevice for SimulatedDevice {
    async fn acquire(&self) -> Result<Box<dyn CaptureSession>, CaptureError> {
        if self.deny_permission {
            return Err(CaptureError::PermissionDenied);
        }
        let chunks = self
            .chunks
            .lock()
            .map(|mut q| std::mem::take(&mut *q))
            .unwrap_or_default();
        Ok(Box::new(SimulatedSession {
            chunks,
            open: false,
        }))
    }
}

struct SimulatedSession {
    chunks: VecDeque<Vec<u8>>,
    open: bool,
}

#[async_trait]
impl CaptureSession for SimulatedSession {
    async fn start_segment(&mut self) -> Result<(), CaptureError> {
        if self.open {
            return Err(CaptureError::Device("segment already open".to_string()));
        }
        self.open = true;
        Ok(())
    }

    async fn stop_segment(&mut self) -> Result<Vec<u8>, CaptureError> {
        if !self.open {
            return Err(CaptureError::Device("no open segment".to_string()));
        }
        self.open = false;
        Ok(self.chunks.pop_front().unwrap_or_default())
    }

    async fn release(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_open_segment_invariant() {
        let device = SimulatedDevice::with_chunks(vec![vec![1, 2, 3]]);
        let mut session = device.acquire().await.unwrap();

        session.start_segment().await.unwrap();
        assert!(session.start_segment().await.is_err());

        let bytes = session.stop_segment().await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert!(session.stop_segment().await.is_err());
    }

    #[tokio::test]
    async fn test_denied_device() {
        let device = SimulatedDevice::denied();
        assert_eq!(
            device.acquire().await.err(),
            Some(CaptureError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_exhausted_script_yields_empty() {
        let device = SimulatedDevice::with_chunks(vec![]);
        let mut session = device.acquire().await.unwrap();
        session.start_segment().await.unwrap();
        assert!(session.stop_segment().await.unwrap().is_empty());
    }
}
