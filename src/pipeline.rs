//! Validation and sequential execution of a compilation chain.
//!
//! Only the first step can be checked before anything runs: an adapter's
//! output language may depend on the arguments chosen for it, so each later
//! step is checked against the code actually produced by its predecessor.

use crate::arguments::ShaderCompilerArguments;
use crate::code::ShaderCode;
use crate::compiler::{CompileContext, ShaderCompiler};
use crate::error::{Error, Result};
use crate::registry::CompilerRegistry;
use crate::result::{CompilerResult, CompilerResultResponse};
use elapsed::measure_time;
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationStep {
    pub compiler_name: String,
    #[serde(default)]
    pub arguments: HashMap<String, String>,
}

impl CompilationStep {
    pub fn new(compiler_name: &str) -> Self {
        CompilationStep {
            compiler_name: compiler_name.to_string(),
            arguments: HashMap::new(),
        }
    }

    pub fn with_argument(mut self, name: &str, value: &str) -> Self {
        self.arguments.insert(name.to_string(), value.to_string());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShaderCompilationRequest {
    pub source_language: String,
    pub code: String,
    pub steps: Vec<CompilationStep>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderCompilationResponse {
    pub results: Vec<CompilerResultResponse>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineResult {
    /// One entry per executed step, ending at the first failure.
    pub results: Vec<CompilerResult>,
    /// Terminal state of every requested step.
    pub states: Vec<StepState>,
}

impl PipelineResult {
    /// Whether every requested step succeeded.
    pub fn is_complete(&self) -> bool {
        self.states.iter().all(|state| *state == StepState::Succeeded)
    }

    /// Index of the step that stopped the chain.
    pub fn failed_step(&self) -> Option<usize> {
        self.states.iter().position(|state| *state == StepState::Failed)
    }

    /// Code produced by the last step that ran, if it succeeded.
    pub fn final_code(&self) -> Option<&ShaderCode> {
        self.results
            .last()
            .and_then(|result| result.pipeable_output.as_ref())
    }

    pub fn to_response(&self) -> ShaderCompilationResponse {
        ShaderCompilationResponse {
            results: self.results.iter().map(|result| result.to_response()).collect(),
        }
    }
}

pub struct Pipeline<'a> {
    registry: &'a CompilerRegistry,
    context: &'a CompileContext,
}

impl<'a> Pipeline<'a> {
    pub fn new(registry: &'a CompilerRegistry, context: &'a CompileContext) -> Self {
        Pipeline { registry, context }
    }

    /// Static pre-check: the first step names a registered compiler that
    /// accepts the request's source language. Later steps are checked during
    /// execution.
    pub fn validate(&self, request: &ShaderCompilationRequest) -> Result<()> {
        match request.steps.first() {
            Some(step) => self
                .check_step(step, &request.source_language)
                .map(|_| ()),
            None => Ok(()),
        }
    }

    /// Run every step in order, stopping at the first failure.
    ///
    /// Validation and tool failures are reported inside the returned result.
    /// `Err` means the environment is broken (tool missing, temp directory
    /// unwritable) and no step result could be trusted.
    pub fn execute(&self, request: &ShaderCompilationRequest) -> Result<PipelineResult> {
        let step_count = request.steps.len();
        let mut states = vec![StepState::Skipped; step_count];
        let mut results = Vec::with_capacity(step_count);

        if step_count == 0 {
            return Ok(PipelineResult { results, states });
        }
        states[0] = StepState::Pending;

        if let Err(err) = self.validate(request) {
            if !err.is_validation() {
                return Err(err);
            }
            warn!("Rejected pipeline before execution: {}", err);
            states[0] = StepState::Failed;
            results.push(CompilerResult::validation_failure(err.to_string()));
            return Ok(PipelineResult { results, states });
        }

        let mut code = ShaderCode::text(request.source_language.as_str(), request.code.as_str());
        let mut previous: Vec<ShaderCompilerArguments> = Vec::with_capacity(step_count);

        for (index, step) in request.steps.iter().enumerate() {
            debug_assert_eq!(states[index], StepState::Pending);
            states[index] = StepState::Running;
            info!(
                "Step {}/{}: {} on {}",
                index + 1,
                step_count,
                step.compiler_name,
                code.language()
            );

            let (elapsed, outcome) = measure_time(|| self.run_step(step, &code, &previous));
            let (result, arguments) = match outcome {
                Ok(StepOutcome::Compiled(result, arguments)) => (result, Some(arguments)),
                Ok(StepOutcome::Rejected(err)) => {
                    warn!("Step {} rejected: {}", index + 1, err);
                    (CompilerResult::validation_failure(err.to_string()), None)
                }
                Err(err) => {
                    error!(
                        "Step {} ({}) failed with an infrastructure error: {}",
                        index + 1,
                        step.compiler_name,
                        err
                    );
                    return Err(err);
                }
            };

            if !result.success {
                warn!(
                    "Step {} ({}) failed after {} with code {:?}",
                    index + 1,
                    step.compiler_name,
                    elapsed,
                    result.failure_code
                );
                states[index] = StepState::Failed;
                results.push(result);
                break;
            }

            info!("Step {} ({}) succeeded in {}", index + 1, step.compiler_name, elapsed);
            states[index] = StepState::Succeeded;

            let is_last = index + 1 == step_count;
            match result.pipeable_output {
                Some(ref output) => code = output.clone(),
                None if !is_last => {
                    return Err(Error::bug(format!(
                        "compiler '{}' reported success without producing code",
                        step.compiler_name
                    )));
                }
                None => {}
            }

            if let Some(arguments) = arguments {
                previous.push(arguments);
            }
            results.push(result);

            if !is_last {
                states[index + 1] = StepState::Pending;
            }
        }

        Ok(PipelineResult { results, states })
    }

    fn check_step(&self, step: &CompilationStep, language: &str) -> Result<&'a dyn ShaderCompiler> {
        let compiler = self.registry.find_by_name(&step.compiler_name)?;
        if !compiler.descriptor().accepts(language) {
            return Err(Error::incompatible_input(&step.compiler_name, language));
        }
        Ok(compiler)
    }

    fn run_step(
        &self,
        step: &CompilationStep,
        code: &ShaderCode,
        previous: &[ShaderCompilerArguments],
    ) -> Result<StepOutcome> {
        let compiler = match self.check_step(step, code.language()) {
            Ok(compiler) => compiler,
            Err(ref err) if err.is_validation() => return Ok(StepOutcome::Rejected(err.to_string())),
            Err(err) => return Err(err),
        };

        let arguments = match ShaderCompilerArguments::resolve(
            compiler.descriptor(),
            &step.arguments,
            code.language(),
        ) {
            Ok(arguments) => arguments,
            Err(ref err) if err.is_validation() => return Ok(StepOutcome::Rejected(err.to_string())),
            Err(err) => return Err(err),
        };

        for argument in arguments.iter() {
            debug!(
                "  {} = {:?}{}",
                argument.name,
                argument.value,
                if argument.active { "" } else { " (inactive)" }
            );
        }

        let result = compiler.compile(self.context, code, &arguments, previous)?;
        Ok(StepOutcome::Compiled(result, arguments))
    }
}

enum StepOutcome {
    Compiled(CompilerResult, ShaderCompilerArguments),
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompilerDescriptor;
    use crate::process::ProcessRunner;
    use crate::result::CompilerOutput;
    use std::path::Path;

    struct Reverse {
        descriptor: CompilerDescriptor,
    }

    impl Reverse {
        fn new(name: &str, input: &str, output: &str) -> Self {
            Reverse {
                descriptor: CompilerDescriptor::new(name, name)
                    .with_input_languages(&[input])
                    .with_output_languages(&[output]),
            }
        }
    }

    impl ShaderCompiler for Reverse {
        fn descriptor(&self) -> &CompilerDescriptor {
            &self.descriptor
        }

        fn compile(
            &self,
            _context: &CompileContext,
            code: &ShaderCode,
            _arguments: &ShaderCompilerArguments,
            _previous: &[ShaderCompilerArguments],
        ) -> Result<CompilerResult> {
            let reversed: String = code.as_text().unwrap_or("").chars().rev().collect();
            Ok(CompilerResult::success(
                ShaderCode::text(self.descriptor.output_languages[0].as_str(), reversed),
                vec![CompilerOutput::output("")],
            ))
        }
    }

    fn registry() -> CompilerRegistry {
        CompilerRegistry::new(vec![
            Box::new(Reverse::new("forward", "A", "B")),
            Box::new(Reverse::new("backward", "B", "A")),
        ])
        .unwrap()
    }

    fn context() -> CompileContext {
        CompileContext::with_runner(Path::new("."), Path::new("."), ProcessRunner::default())
    }

    fn request(steps: &[&str]) -> ShaderCompilationRequest {
        ShaderCompilationRequest {
            source_language: "A".to_string(),
            code: "abc".to_string(),
            steps: steps.iter().map(|name| CompilationStep::new(name)).collect(),
        }
    }

    #[test]
    fn empty_pipeline_produces_no_results() {
        let registry = registry();
        let context = context();
        let result = Pipeline::new(&registry, &context)
            .execute(&request(&[]))
            .unwrap();
        assert!(result.results.is_empty());
        assert!(result.states.is_empty());
    }

    #[test]
    fn chain_threads_code_through_every_step() {
        let registry = registry();
        let context = context();
        let result = Pipeline::new(&registry, &context)
            .execute(&request(&["forward", "backward", "forward"]))
            .unwrap();
        assert!(result.is_complete());
        assert_eq!(result.results.len(), 3);
        let code = result.final_code().unwrap();
        assert_eq!(code.language(), "B");
        assert_eq!(code.as_text(), Some("cba"));
    }

    #[test]
    fn static_check_only_covers_the_first_step() {
        let registry = registry();
        let context = context();
        let pipeline = Pipeline::new(&registry, &context);

        assert!(pipeline.validate(&request(&["forward", "nope"])).is_ok());

        let err = pipeline.validate(&request(&["backward"])).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn unknown_compiler_later_in_the_chain_fails_that_step() {
        let registry = registry();
        let context = context();
        let result = Pipeline::new(&registry, &context)
            .execute(&request(&["forward", "nope", "backward"]))
            .unwrap();
        assert_eq!(result.results.len(), 2);
        assert!(result.results[0].success);
        assert!(!result.results[1].success);
        assert_eq!(
            result.results[1].output("Output").unwrap().value.as_deref(),
            Some("unknown compiler 'nope'")
        );
        assert_eq!(
            result.states,
            vec![StepState::Succeeded, StepState::Failed, StepState::Skipped]
        );
        assert_eq!(result.failed_step(), Some(1));
    }

    #[test]
    fn response_mirrors_the_results() {
        let registry = registry();
        let context = context();
        let result = Pipeline::new(&registry, &context)
            .execute(&request(&["forward"]))
            .unwrap();
        let response = result.to_response();
        assert_eq!(response.results.len(), 1);
        assert!(response.results[0].success);
        assert_eq!(response.results[0].output_size, Some(3));
    }

    #[test]
    fn request_parses_from_json() {
        let request: ShaderCompilationRequest = serde_json::from_str(
            r#"{
                "sourceLanguage": "HLSL",
                "code": "float4 main() : SV_Target { return 0; }",
                "steps": [
                    { "compilerName": "dxc", "arguments": { "OutputLanguage": "SPIR-V" } },
                    { "compilerName": "spirv-cross" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(request.source_language, "HLSL");
        assert_eq!(request.steps.len(), 2);
        assert_eq!(request.steps[0].arguments["OutputLanguage"], "SPIR-V");
        assert!(request.steps[1].arguments.is_empty());
    }
}
