// In-memory rendering context for protocol tests
//
// Records every step the frame protocol and renderer drive, and models the
// in-flight fence with a parking_lot condvar so tests can stall the "GPU".

use anyhow::{bail, Result};
use ash::vk;
use parking_lot::{Condvar, Mutex};
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::context::{Command, PipelineDesc, RenderContext};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Rebuild(vk::Extent2D),
    LoadShader(PathBuf),
    DestroyShader(u32),
    CreatePipeline { vertex: u32, fragment: u32, push_constant_size: u32 },
    DestroyPipeline(u32),
    WaitForFrameSlot,
    AcquireImage(u32),
    BeginCommands(u32),
    BindPipeline(u32),
    SetViewport(vk::Extent2D),
    SetScissor(vk::Extent2D),
    PushConstants { stages: vk::ShaderStageFlags, bytes: Vec<u8> },
    Draw { vertex_count: u32, instance_count: u32 },
    Submit,
    QueuePresent(u32),
    ReleaseFrameSlot { image_acquired: bool },
    WaitIdle,
}

#[derive(Debug, PartialEq, Eq)]
pub struct MockPipeline(pub u32);

/// Stand-in for the command buffer; not Clone so ownership is tracked
#[derive(Debug)]
pub struct MockCommands;

/// Shared in-flight fence
#[derive(Clone, Default)]
pub struct MockFence(Arc<(Mutex<bool>, Condvar)>);

impl MockFence {
    fn signaled() -> Self {
        let fence = Self::default();
        fence.signal();
        fence
    }

    pub fn signal(&self) {
        let (lock, cvar) = &*self.0;
        *lock.lock() = true;
        cvar.notify_all();
    }

    fn wait_and_reset(&self) {
        let (lock, cvar) = &*self.0;
        let mut signaled = lock.lock();
        while !*signaled {
            cvar.wait(&mut signaled);
        }
        *signaled = false;
    }
}

pub struct MockContext {
    pub window: vk::Extent2D,
    pub built_for: vk::Extent2D,
    pub image_count: u32,
    pub fail_acquire: bool,
    pub fail_submit: bool,
    pub fail_pipeline: bool,
    next_image: u32,
    next_id: Cell<u32>,
    command_buffer: Option<MockCommands>,
    fence: MockFence,
    stalled: bool,
    events: RefCell<Vec<Event>>,
}

impl MockContext {
    /// Context attached to a `width`×`height` window with the chain already built
    pub fn new(width: u32, height: u32, image_count: u32) -> Self {
        let extent = vk::Extent2D { width, height };
        Self {
            window: extent,
            built_for: extent,
            image_count,
            fail_acquire: false,
            fail_submit: false,
            fail_pipeline: false,
            next_image: 0,
            next_id: Cell::new(1),
            command_buffer: Some(MockCommands),
            fence: MockFence::signaled(),
            stalled: false,
            events: RefCell::new(Vec::new()),
        }
    }

    /// Leave the fence unsignaled, as if the previous frame is still running.
    /// Submissions no longer signal it either; the returned handle does.
    pub fn stall_gpu(&mut self) -> MockFence {
        self.fence = MockFence::default();
        self.stalled = true;
        self.fence.clone()
    }

    pub fn resize_window(&mut self, width: u32, height: u32) {
        self.window = vk::Extent2D { width, height };
    }

    pub fn has_command_buffer(&self) -> bool {
        self.command_buffer.is_some()
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| predicate(e)).count()
    }

    /// Every protocol step so far, in order
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    fn next_id(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }
}

impl RenderContext for MockContext {
    type Shader = u32;
    type Pipeline = MockPipeline;
    type Commands = MockCommands;

    fn extent(&self) -> vk::Extent2D {
        self.built_for
    }

    fn swapchain_size(&self) -> vk::Extent2D {
        self.built_for
    }

    fn window_size(&self) -> vk::Extent2D {
        self.window
    }

    fn swapchain_image_count(&self) -> u32 {
        self.image_count
    }

    fn rebuild_swapchain(&mut self) -> Result<()> {
        self.built_for = self.window;
        self.next_image = 0;
        self.push(Event::Rebuild(self.window));
        Ok(())
    }

    fn load_shader(&self, path: &Path) -> Result<u32> {
        self.push(Event::LoadShader(path.to_path_buf()));
        Ok(self.next_id())
    }

    fn destroy_shader(&self, shader: u32) {
        self.push(Event::DestroyShader(shader));
    }

    fn create_pipeline(&self, desc: &PipelineDesc<u32>) -> Result<MockPipeline> {
        self.push(Event::CreatePipeline {
            vertex: desc.vertex_shader,
            fragment: desc.fragment_shader,
            push_constant_size: desc.push_constant_size,
        });
        if self.fail_pipeline {
            bail!("pipeline rejected");
        }
        Ok(MockPipeline(self.next_id()))
    }

    fn destroy_pipeline(&self, pipeline: MockPipeline) {
        self.push(Event::DestroyPipeline(pipeline.0));
    }

    fn wait_for_frame_slot(&mut self) -> Result<()> {
        self.push(Event::WaitForFrameSlot);
        self.fence.wait_and_reset();
        Ok(())
    }

    fn acquire_image(&mut self) -> Result<u32> {
        if self.fail_acquire {
            bail!("acquire rejected");
        }
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        self.push(Event::AcquireImage(index));
        Ok(index)
    }

    fn begin_commands(&mut self, image_index: u32) -> Result<MockCommands> {
        let Some(commands) = self.command_buffer.take() else {
            bail!(crate::error::ContextError::FrameInFlight);
        };
        self.push(Event::BeginCommands(image_index));
        Ok(commands)
    }

    fn record(&self, _commands: &mut MockCommands, command: Command<'_, MockPipeline>) {
        let event = match command {
            Command::BindPipeline(pipeline) => Event::BindPipeline(pipeline.0),
            Command::SetViewport(extent) => Event::SetViewport(extent),
            Command::SetScissor(extent) => Event::SetScissor(extent),
            Command::PushConstants { stages, bytes, .. } => Event::PushConstants {
                stages,
                bytes: bytes.to_vec(),
            },
            Command::Draw {
                vertex_count,
                instance_count,
            } => Event::Draw {
                vertex_count,
                instance_count,
            },
        };
        self.push(event);
    }

    fn submit(&mut self, commands: MockCommands) -> Result<()> {
        self.command_buffer = Some(commands);
        if self.fail_submit {
            bail!("submit rejected");
        }
        self.push(Event::Submit);
        if !self.stalled {
            self.fence.signal();
        }
        Ok(())
    }

    fn queue_present(&mut self, image_index: u32) -> Result<()> {
        self.push(Event::QueuePresent(image_index));
        Ok(())
    }

    fn release_frame_slot(&mut self, image_acquired: bool) -> Result<()> {
        self.push(Event::ReleaseFrameSlot { image_acquired });
        self.fence.signal();
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.push(Event::WaitIdle);
        Ok(())
    }
}
