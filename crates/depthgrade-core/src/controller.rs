//! Per-frame orchestration of the depth grading effect.
//!
//! The host owns scheduling and GPU resources; it drives the controller
//! through `activate` / `render_frame` / `deactivate` and supplies an
//! [`EffectBackend`] that knows how to load the program and run the pass.

use glam::Mat4;

use crate::constants::ShaderConstants;
use crate::error::EffectError;
use crate::lut::{LutGenerator, LutTable};
use crate::params::{EffectSettings, GradingParameters};

/// Fixed identifier of the resample program.
pub const PROGRAM_NAME: &str = "PostEffect/DepthColorGrading";

/// Camera state for the frame being rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewContext {
    /// Zero-to-one depth perspective projection.
    pub projection: Mat4,
    pub hdr_enabled: bool,
    pub post_processing_enabled: bool,
}

impl ViewContext {
    /// Whether `settings` produce any work for this view.
    pub fn wants_effect(&self, settings: &EffectSettings) -> bool {
        self.post_processing_enabled && settings.is_active()
    }
}

/// A LUT and the generator revision it was built at.
#[derive(Debug, Clone, Copy)]
pub struct LutBinding<'a> {
    pub table: &'a LutTable,
    pub revision: u64,
}

/// Everything the resample pass reads.
#[derive(Debug, Clone, Copy)]
pub struct PassInputs<'a> {
    pub constants: &'a ShaderConstants,
    pub view: &'a ViewContext,
    pub lut0: LutBinding<'a>,
    pub lut1: LutBinding<'a>,
}

/// Host rendering services the controller depends on.
pub trait EffectBackend {
    /// An instantiated resample program.
    type Program;
    /// The camera color buffer, graded in place.
    type ColorTarget;
    /// The camera depth buffer.
    type DepthSource;

    /// Locate and instantiate the program registered under `name`.
    fn load_program(&mut self, name: &str) -> Result<Self::Program, EffectError>;

    /// Ask the host to produce a depth texture for this camera.
    fn require_depth_texture(&mut self);

    /// Copy `color` to a transient target and resample it back into `color`.
    /// The transient target is released before returning.
    fn execute(
        &mut self,
        program: &mut Self::Program,
        inputs: &PassInputs<'_>,
        color: &mut Self::ColorTarget,
        depth: &Self::DepthSource,
    ) -> Result<(), EffectError>;
}

enum ProgramState<P> {
    Unloaded,
    Ready(P),
    /// Program lookup or creation failed. Permanent for this controller.
    Disabled(EffectError),
}

/// Drives one camera's depth grading: two LUT generators plus the program.
pub struct EffectController<B: EffectBackend> {
    program: ProgramState<B::Program>,
    lut0: LutGenerator,
    lut1: LutGenerator,
}

impl<B: EffectBackend> Default for EffectController<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: EffectBackend> EffectController<B> {
    pub fn new() -> Self {
        Self {
            program: ProgramState::Unloaded,
            lut0: LutGenerator::new(),
            lut1: LutGenerator::new(),
        }
    }

    /// Load the program. A failure is logged once and disables the
    /// controller for the rest of its life.
    pub fn activate(&mut self, backend: &mut B) -> Result<(), EffectError> {
        match self.program {
            ProgramState::Ready(_) => return Ok(()),
            ProgramState::Disabled(ref cause) => return Err(cause.clone()),
            ProgramState::Unloaded => {}
        }

        match backend.load_program(PROGRAM_NAME) {
            Ok(program) => {
                tracing::info!("depth grading activated ({PROGRAM_NAME})");
                self.program = ProgramState::Ready(program);
                Ok(())
            }
            Err(e) => {
                tracing::error!("depth grading disabled: {e}");
                self.program = ProgramState::Disabled(e.clone());
                Err(e)
            }
        }
    }

    /// Release the program and both LUT textures.
    pub fn deactivate(&mut self) {
        if matches!(self.program, ProgramState::Ready(_)) {
            tracing::info!("depth grading deactivated");
            self.program = ProgramState::Unloaded;
        }
        self.lut0.release();
        self.lut1.release();
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.program, ProgramState::Disabled(_))
    }

    /// The failure that disabled this controller, if any.
    pub fn disabled_cause(&self) -> Option<&EffectError> {
        match &self.program {
            ProgramState::Disabled(cause) => Some(cause),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.program, ProgramState::Ready(_))
    }

    /// Whether this frame should do any work at all.
    pub fn is_effect_active(settings: Option<&EffectSettings>, view: &ViewContext) -> bool {
        settings.is_some_and(|s| view.wants_effect(s))
    }

    /// Derive the constants and push both looks into their generators.
    ///
    /// Gamma is negated on the way in.
    pub fn prepare_frame(
        &mut self,
        settings: &EffectSettings,
        view: &ViewContext,
    ) -> ShaderConstants {
        let constants =
            ShaderConstants::derive(&settings.config, &view.projection, view.hdr_enabled);
        self.lut0.set_parameters(generator_parameters(&settings.near));
        self.lut1.set_parameters(generator_parameters(&settings.far));
        constants
    }

    /// Run one frame. Returns the constants used, or `None` when the frame
    /// was skipped.
    pub fn render_frame(
        &mut self,
        backend: &mut B,
        settings: Option<&EffectSettings>,
        view: &ViewContext,
        color: &mut B::ColorTarget,
        depth: &B::DepthSource,
    ) -> Result<Option<ShaderConstants>, EffectError> {
        let Some(settings) = settings.filter(|_| view.post_processing_enabled) else {
            tracing::trace!("depth grading has no settings or post processing is off");
            return Ok(None);
        };
        if !settings.is_active() {
            tracing::trace!("depth grading blend is zero, skipping frame");
            return Ok(None);
        }

        if matches!(self.program, ProgramState::Unloaded) && self.activate(backend).is_err() {
            return Ok(None);
        }
        if !self.is_ready() {
            return Ok(None);
        }

        backend.require_depth_texture();

        let constants = self.prepare_frame(settings, view);
        let revision0 = self.lut0.refresh();
        let revision1 = self.lut1.refresh();

        let (Some(table0), Some(table1), ProgramState::Ready(program)) =
            (self.lut0.cached(), self.lut1.cached(), &mut self.program)
        else {
            return Ok(None);
        };

        let inputs = PassInputs {
            constants: &constants,
            view,
            lut0: LutBinding {
                table: table0,
                revision: revision0,
            },
            lut1: LutBinding {
                table: table1,
                revision: revision1,
            },
        };
        backend.execute(program, &inputs, color, depth)?;
        Ok(Some(constants))
    }

    pub fn lut0(&self) -> &LutGenerator {
        &self.lut0
    }

    pub fn lut1(&self) -> &LutGenerator {
        &self.lut1
    }
}

/// Parameters as a LUT generator expects them: gamma negated.
pub fn generator_parameters(params: &GradingParameters) -> GradingParameters {
    GradingParameters {
        gamma: -params.gamma,
        ..*params
    }
}
