//! In-process backend embedding QuickJS through `rquickjs`.
//!
//! Every `load` creates a fresh runtime and context, evaluates the workload's
//! sources in order and checks that the entry point is a global function.
//! Dropping the loaded program frees the context and then the runtime.
//! Built without the `quickjs` feature the backend reports itself unavailable.

use std::time::Duration;

use crate::workload::Workload;

use super::traits::{Backend, InvocationError, LoadError, LoadedProgram, Variant};

/// Engine limits for the embedded runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuickJsConfig {
    /// Heap limit in bytes
    pub memory_limit: Option<usize>,
    /// Stack limit in bytes
    pub max_stack_size: Option<usize>,
}

impl QuickJsConfig {
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    pub fn with_max_stack_size(mut self, bytes: usize) -> Self {
        self.max_stack_size = Some(bytes);
        self
    }
}

pub struct QuickJsBackend {
    name: String,
    config: QuickJsConfig,
}

impl QuickJsBackend {
    pub fn new(name: impl Into<String>, config: QuickJsConfig) -> Self {
        QuickJsBackend {
            name: name.into(),
            config,
        }
    }
}

impl Default for QuickJsBackend {
    fn default() -> Self {
        Self::new("quickjs", QuickJsConfig::default())
    }
}

impl Backend for QuickJsBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> Variant {
        Variant::InProcess
    }

    fn version(&self) -> Option<String> {
        cfg!(feature = "quickjs").then(|| "quickjs (rquickjs 0.9)".to_string())
    }

    fn is_available(&self) -> bool {
        cfg!(feature = "quickjs")
    }

    #[cfg(feature = "quickjs")]
    fn load<'a>(&'a self, workload: &Workload) -> Result<Box<dyn LoadedProgram + 'a>, LoadError> {
        engine::load(&self.config, workload)
    }

    #[cfg(not(feature = "quickjs"))]
    fn load<'a>(&'a self, _workload: &Workload) -> Result<Box<dyn LoadedProgram + 'a>, LoadError> {
        Err(LoadError::new("built without the `quickjs` feature"))
    }
}

#[cfg(feature = "quickjs")]
mod engine {
    use std::time::Instant;

    use rquickjs::{Context, Ctx, Function, Runtime, Value};

    use super::*;

    // Field order matters: the context is dropped before its runtime.
    struct QuickJsProgram {
        context: Context,
        _runtime: Runtime,
        entry_point: String,
    }

    pub(super) fn load(
        config: &QuickJsConfig,
        workload: &Workload,
    ) -> Result<Box<dyn LoadedProgram + 'static>, LoadError> {
        let runtime = Runtime::new()
            .map_err(|e| LoadError::new(format!("failed to create runtime: {e}")))?;
        if let Some(limit) = config.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(size) = config.max_stack_size {
            runtime.set_max_stack_size(size);
        }
        let context = Context::full(&runtime)
            .map_err(|e| LoadError::new(format!("failed to create context: {e}")))?;

        context.with(|ctx| -> Result<(), LoadError> {
            for source in workload.sources() {
                ctx.eval::<Value, _>(source.text.as_str())
                    .map_err(|e| LoadError::in_source(&source.name, describe(&ctx, e)))?;
            }
            let entry: Value = ctx
                .globals()
                .get(workload.entry_point())
                .map_err(|e| LoadError::new(describe(&ctx, e)))?;
            if !entry.is_function() {
                return Err(LoadError::new(format!(
                    "entry point `{}` is not a function",
                    workload.entry_point()
                )));
            }
            Ok(())
        })?;

        Ok(Box::new(QuickJsProgram {
            context,
            _runtime: runtime,
            entry_point: workload.entry_point().to_string(),
        }))
    }

    impl LoadedProgram for QuickJsProgram {
        fn invoke(&mut self) -> Result<Duration, InvocationError> {
            let entry_point = self.entry_point.as_str();
            self.context.with(|ctx| {
                let entry: Function = ctx
                    .globals()
                    .get(entry_point)
                    .map_err(|e| InvocationError::EngineGone(describe(&ctx, e)))?;
                let start = Instant::now();
                let outcome = entry.call::<_, Value>(());
                let elapsed = start.elapsed();
                outcome
                    .map(|_| elapsed)
                    .map_err(|e| InvocationError::Script(describe(&ctx, e)))
            })
        }
    }

    /// Turn an engine error into a message, pulling the pending exception if any.
    fn describe(ctx: &Ctx<'_>, err: rquickjs::Error) -> String {
        if !err.is_exception() {
            return err.to_string();
        }
        let thrown = ctx.catch();
        if let Some(exception) = thrown.as_exception() {
            return exception
                .message()
                .unwrap_or_else(|| "uncaught exception".to_string());
        }
        format!("uncaught exception: {thrown:?}")
    }
}
