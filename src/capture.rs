//! Frame handoff between a capture/render thread and the retina sweep
//!
//! The producer publishes whole frames; the retina loads one snapshot at the
//! start of each sweep and keeps it for the duration of that sweep.

use crate::error::{WavyError, WavyResult};
use crate::pixel::{LumaFrame, PixelSource};
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Lock-free slot holding the current input frame
pub struct FrameSlot {
    width: u32,
    height: u32,
    current: ArcSwap<LumaFrame>,
}

impl FrameSlot {
    /// Start with a black frame of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            current: ArcSwap::from_pointee(LumaFrame::new(width, height)),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Replace the current frame. Frames of a different size are rejected so
    /// captor coordinates stay valid for every snapshot.
    pub fn publish(&self, frame: LumaFrame) -> WavyResult<()> {
        self.publish_arc(Arc::new(frame))
    }

    pub fn publish_arc(&self, frame: Arc<LumaFrame>) -> WavyResult<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(WavyError::config(format!(
                "frame is {}x{}, slot expects {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        self.current.store(frame);
        Ok(())
    }

    /// The frame current at the time of the call; later publishes do not affect it
    pub fn snapshot(&self) -> Arc<LumaFrame> {
        self.current.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_stable_across_publish() {
        let slot = FrameSlot::new(2, 2);
        let before = slot.snapshot();
        slot.publish(LumaFrame::filled(2, 2, 255)).unwrap();
        assert_eq!(before.sample(0, 0), 0);
        assert_eq!(slot.snapshot().sample(0, 0), 255);
    }

    #[test]
    fn test_publish_rejects_wrong_size() {
        let slot = FrameSlot::new(2, 2);
        assert!(slot.publish(LumaFrame::new(3, 2)).is_err());
    }

    #[test]
    fn test_publish_from_another_thread() {
        let slot = Arc::new(FrameSlot::new(4, 4));
        let producer = {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || {
                for v in [10u8, 20, 30] {
                    slot.publish(LumaFrame::filled(4, 4, v)).unwrap();
                }
            })
        };
        producer.join().unwrap();
        assert_eq!(slot.snapshot().sample(3, 3), 30);
    }
}
