// Frame - one acquired presentable image
//
// FRAME TIMELINE:
// ┌──────────────────────────────────────────────────────────────────────┐
// │  wait_fence ─> acquire_image ─> begin ─> record ... ─> present       │
// │                                                         │            │
// │                                  submit ─> queue_present ─> wait_idle│
// └──────────────────────────────────────────────────────────────────────┘
//
// A `Frame` mutably borrows its context, so only one exists at a time, and
// `present` consumes it, so it cannot be presented twice.

use anyhow::Result;
use ash::vk;

use crate::context::{Command, RenderContext};

/// Acquire the next frame from `ctx`.
///
/// Waits (unbounded) for the previous frame's in-flight gate before touching
/// the swapchain.
pub fn acquire<C: RenderContext>(ctx: &mut C) -> Result<Frame<'_, C>> {
    ctx.wait_for_frame_slot()?;

    // The gate is reset from here on: every failure must re-arm it.
    let image_index = match ctx.acquire_image() {
        Ok(index) => index,
        Err(e) => return Err(abandon(ctx, false, e)),
    };
    let commands = match ctx.begin_commands(image_index) {
        Ok(commands) => commands,
        Err(e) => return Err(abandon(ctx, true, e)),
    };

    log::trace!("Acquired swapchain image {}", image_index);

    Ok(Frame {
        ctx,
        image_index,
        commands: Some(commands),
    })
}

/// Re-arm the frame gate after a failed step and hand back the original error
fn abandon<C: RenderContext>(ctx: &mut C, image_acquired: bool, error: anyhow::Error) -> anyhow::Error {
    if let Err(e) = ctx.release_frame_slot(image_acquired) {
        log::error!("Failed to release frame slot: {:?}", e);
    }
    error
}

/// An in-progress frame. Record into it, then call [`Frame::present`].
///
/// Presenting twice does not compile:
///
/// ```compile_fail
/// fn twice<C: plonk::RenderContext>(frame: plonk::Frame<'_, C>) -> anyhow::Result<()> {
///     frame.present()?;
///     frame.present()
/// }
/// ```
///
/// Dropping a frame without presenting it presents it anyway, so the
/// in-flight gate is always signaled again.
#[must_use = "an acquired frame must be presented"]
pub struct Frame<'ctx, C: RenderContext> {
    ctx: &'ctx mut C,
    image_index: u32,
    commands: Option<C::Commands>,
}

impl<C: RenderContext> Frame<'_, C> {
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// Extent of the image being rendered
    pub fn extent(&self) -> vk::Extent2D {
        self.ctx.extent()
    }

    pub fn record(&mut self, command: Command<'_, C::Pipeline>) {
        if let Some(commands) = self.commands.as_mut() {
            self.ctx.record(commands, command);
        }
    }

    /// Submit the recorded commands and present the image.
    pub fn present(mut self) -> Result<()> {
        match self.commands.take() {
            Some(commands) => self.finish(commands),
            None => Ok(()),
        }
    }

    fn finish(&mut self, commands: C::Commands) -> Result<()> {
        if let Err(e) = self.ctx.submit(commands) {
            return Err(abandon(&mut *self.ctx, true, e));
        }
        self.ctx.queue_present(self.image_index)?;

        // Single frame in flight: nothing from this frame survives the call.
        self.ctx.wait_idle()
    }
}

impl<C: RenderContext> Drop for Frame<'_, C> {
    fn drop(&mut self) {
        if let Some(commands) = self.commands.take() {
            log::warn!("Frame {} dropped without present, presenting it", self.image_index);
            if let Err(e) = self.finish(commands) {
                log::error!("Implicit present failed: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, MockContext};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_acquire_then_present_runs_protocol_in_order() {
        let mut ctx = MockContext::new(1024, 768, 3);

        let frame = ctx.acquire_frame().unwrap();
        assert_eq!(frame.image_index(), 0);
        frame.present().unwrap();

        assert_eq!(
            ctx.events(),
            vec![
                Event::WaitForFrameSlot,
                Event::AcquireImage(0),
                Event::BeginCommands(0),
                Event::Submit,
                Event::QueuePresent(0),
                Event::WaitIdle,
            ]
        );
    }

    #[test]
    fn test_command_buffer_returns_to_context_after_present() {
        let mut ctx = MockContext::new(1024, 768, 2);

        let frame = ctx.acquire_frame().unwrap();
        frame.present().unwrap();
        assert!(ctx.has_command_buffer());

        let frame = ctx.acquire_frame().unwrap();
        assert_eq!(frame.image_index(), 1);
        frame.present().unwrap();
        assert!(ctx.has_command_buffer());
    }

    #[test]
    fn test_present_exactly_once_per_acquire() {
        let mut ctx = MockContext::new(640, 480, 3);

        for _ in 0..5 {
            ctx.acquire_frame().unwrap().present().unwrap();
        }

        assert_eq!(ctx.count(|e| matches!(e, Event::AcquireImage(_))), 5);
        assert_eq!(ctx.count(|e| matches!(e, Event::QueuePresent(_))), 5);
        assert_eq!(ctx.count(|e| matches!(e, Event::Submit)), 5);
    }

    #[test]
    fn test_dropped_frame_is_presented() {
        let mut ctx = MockContext::new(640, 480, 3);

        {
            let _frame = ctx.acquire_frame().unwrap();
        }

        assert_eq!(ctx.count(|e| matches!(e, Event::QueuePresent(0))), 1);
        assert!(ctx.has_command_buffer());

        // The gate was signaled again, so the next acquire does not hang.
        ctx.acquire_frame().unwrap().present().unwrap();
    }

    #[test]
    fn test_failed_acquire_produces_no_frame() {
        let mut ctx = MockContext::new(640, 480, 3);
        ctx.fail_acquire = true;

        assert!(ctx.acquire_frame().is_err());
        assert_eq!(ctx.count(|e| matches!(e, Event::BeginCommands(_))), 0);
        assert_eq!(ctx.count(|e| matches!(e, Event::QueuePresent(_))), 0);
        assert_eq!(
            ctx.count(|e| *e == Event::ReleaseFrameSlot { image_acquired: false }),
            1
        );
    }

    /// Acquire and present on a worker thread so a gate left unsignaled shows
    /// up as a timeout instead of a hung test.
    fn present_next_frame(mut ctx: MockContext) -> MockContext {
        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            let result = ctx.acquire_frame().and_then(|frame| frame.present());
            tx.send(result.is_ok()).unwrap();
            ctx
        });

        assert!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            "frame after a failure did not present"
        );
        worker.join().unwrap()
    }

    #[test]
    fn test_failed_acquire_leaves_gate_usable() {
        let mut ctx = MockContext::new(640, 480, 3);
        ctx.fail_acquire = true;
        assert!(ctx.acquire_frame().is_err());

        ctx.fail_acquire = false;
        let ctx = present_next_frame(ctx);
        assert_eq!(ctx.count(|e| matches!(e, Event::QueuePresent(_))), 1);
    }

    #[test]
    fn test_failed_submit_leaves_gate_usable() {
        let mut ctx = MockContext::new(640, 480, 3);
        ctx.fail_submit = true;
        assert!(ctx.acquire_frame().unwrap().present().is_err());
        assert_eq!(
            ctx.count(|e| *e == Event::ReleaseFrameSlot { image_acquired: true }),
            1
        );

        ctx.fail_submit = false;
        let ctx = present_next_frame(ctx);
        assert!(ctx.has_command_buffer());
    }

    #[test]
    fn test_failed_submit_is_reported_and_skips_present() {
        let mut ctx = MockContext::new(640, 480, 3);
        ctx.fail_submit = true;

        let frame = ctx.acquire_frame().unwrap();
        assert!(frame.present().is_err());
        assert_eq!(ctx.count(|e| matches!(e, Event::QueuePresent(_))), 0);
    }

    #[test]
    fn test_acquire_blocks_until_gpu_finishes_previous_frame() {
        let mut ctx = MockContext::new(1024, 768, 3);
        let fence = ctx.stall_gpu();

        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            let frame = ctx.acquire_frame().unwrap();
            tx.send(frame.image_index()).unwrap();
            frame.present().unwrap();
            ctx
        });

        // GPU still busy with the previous frame: acquire must not return.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        fence.signal();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 0);
        let ctx = worker.join().unwrap();
        let events = ctx.events();
        assert_eq!(events[0], Event::WaitForFrameSlot);
        assert_eq!(events[1], Event::AcquireImage(0));
    }
}
