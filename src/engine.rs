//! Engine facade
//!
//! Ties decoding, the processor pipeline and the channel together.
//! `compile` turns source text into a processed descriptor; `execute`
//! dispatches a lifecycle verb for a compiled descriptor through the
//! configured channel.

use crate::answers::AnswerSet;
use crate::channel::SharedChannel;
use crate::command::{self, CommandOutcome, ExecuteOptions, Verb};
use crate::descriptor::{Descriptor, SourceFormat};
use crate::error::{Result, StaveError};
use crate::pipeline::Pipeline;

/// Network modes the channel endpoints accept.
const SUPPORTED_NET_MODES: [&str; 2] = ["bridge", "host"];

/// Compile and execute entry point.
pub struct Engine {
    pipeline: Pipeline,
    channel: Option<SharedChannel>,
}

impl Engine {
    /// Engine with the standard pipeline and no channel. Enough for
    /// compile-only use; `execute` requires a channel.
    pub fn new() -> Self {
        Self {
            pipeline: Pipeline::standard(),
            channel: None,
        }
    }

    pub fn with_channel(mut self, channel: SharedChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Decode `source`, fold in caller answers and run the pipeline.
    ///
    /// Caller answers override answers inlined in the descriptor.
    pub fn compile(
        &self,
        source: &str,
        format: SourceFormat,
        answers: &AnswerSet,
    ) -> Result<Descriptor> {
        let mut descriptor = Descriptor::from_source(source, format)?;
        descriptor.answers.merge(answers);
        self.pipeline.run(&mut descriptor)?;
        check_net_modes(&descriptor)?;
        tracing::debug!(
            applications = descriptor.applications.len(),
            "descriptor compiled"
        );
        Ok(descriptor)
    }

    /// Dispatch one verb for a compiled descriptor.
    ///
    /// Every required catalog question must hold an answer before any
    /// channel call is issued.
    pub async fn execute(
        &self,
        descriptor: &Descriptor,
        verb: Verb,
        options: &ExecuteOptions,
    ) -> Result<CommandOutcome> {
        let channel = self.channel.as_ref().ok_or_else(|| {
            StaveError::Config("no channel configured; commands require one".to_string())
        })?;
        let open = descriptor.unanswered_questions();
        if !open.is_empty() {
            return Err(StaveError::Semantic(format!(
                "unanswered required questions: {}",
                open.join(", ")
            )));
        }
        command::execute(channel, descriptor, verb, options).await
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Interpolation can rewrite `net`, so the mode check runs after the
/// pipeline rather than during decode.
fn check_net_modes(descriptor: &Descriptor) -> Result<()> {
    for app in &descriptor.applications {
        if !SUPPORTED_NET_MODES.contains(&app.net.as_str()) {
            return Err(StaveError::Semantic(format!(
                "application '{}' net: unsupported mode '{}' (expected bridge or host)",
                app.name, app.net
            )));
        }
    }
    Ok(())
}
