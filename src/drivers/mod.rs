use crate::code::ShaderCode;
use crate::compiler::ShaderCompiler;
use crate::config::Config;
use crate::process::ProcessOutput;
use crate::result::{CompilerOutput, CompilerResult, FAILURE_CODE};
use std::path::Path;

pub mod dxc;
pub mod fxc;
pub mod glslc;
pub mod metal;
pub mod spirv_as;
pub mod spirv_cross;
pub mod spirv_dis;

/// Every built-in adapter, with `Version` options discovered under the
/// configured binaries directory.
pub fn all(config: &Config) -> Vec<Box<dyn ShaderCompiler>> {
    let binaries_path = config.binaries_path.as_path();
    vec![
        Box::new(dxc::Dxc::new(binaries_path)),
        Box::new(fxc::Fxc::new(binaries_path)),
        Box::new(glslc::Glslc::new(binaries_path)),
        Box::new(spirv_cross::SpirvCross::new(binaries_path)),
        Box::new(spirv_as::SpirvAs::new(binaries_path)),
        Box::new(spirv_dis::SpirvDis::new(binaries_path)),
        Box::new(metal::Metal::new(binaries_path)),
        Box::new(metal::MetalLib::new(binaries_path)),
        Box::new(metal::MetalShaderConverter::new(binaries_path)),
    ]
}

/// How a driver decides whether its tool failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuccessRule {
    /// Clean exit and the expected artifact on disk.
    ExitAndArtifact,
    /// Only the artifact counts; for tools whose exit codes are unreliable.
    ArtifactOnly,
}

impl SuccessRule {
    pub fn succeeded(self, process: &ProcessOutput, has_artifact: bool) -> bool {
        if process.timed_out || !has_artifact {
            return false;
        }
        match self {
            SuccessRule::ExitAndArtifact => process.success(),
            SuccessRule::ArtifactOnly => true,
        }
    }
}

/// Turn a finished tool run into a step result. `views` are the extra
/// entries (assembly, disassembly) shown ahead of `Output`.
pub fn finish(
    rule: SuccessRule,
    process: &ProcessOutput,
    artifact: Option<ShaderCode>,
    mut views: Vec<CompilerOutput>,
) -> CompilerResult {
    let success = rule.succeeded(process, artifact.is_some());
    views.push(CompilerOutput::output(process.combined()));
    match artifact {
        Some(code) if success => CompilerResult::success(code, views),
        _ => CompilerResult::failure(FAILURE_CODE, views),
    }
}

pub fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// File name only, for tools launched inside the temp directory.
pub fn file_arg(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().to_string(),
        None => path_arg(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exited(status: i32, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.to_string(),
            timed_out: false,
        }
    }

    #[test]
    fn exit_code_and_artifact_are_both_required() {
        let artifact = || Some(ShaderCode::binary("DXIL", vec![1, 2, 3]));
        let rule = SuccessRule::ExitAndArtifact;

        assert!(finish(rule, &exited(0, ""), artifact(), vec![]).success);
        assert!(!finish(rule, &exited(1, "error"), artifact(), vec![]).success);
        assert!(!finish(rule, &exited(0, ""), None, vec![]).success);
    }

    #[test]
    fn artifact_only_ignores_the_exit_code() {
        let rule = SuccessRule::ArtifactOnly;
        let result = finish(
            rule,
            &exited(1, "warning X3206"),
            Some(ShaderCode::binary("DXBC", vec![0])),
            vec![],
        );
        assert!(result.success);
        assert_eq!(
            result.output("Output").unwrap().value.as_deref(),
            Some("warning X3206")
        );

        let mut timed_out = exited(0, "");
        timed_out.status = None;
        timed_out.timed_out = true;
        assert!(!rule.succeeded(&timed_out, true));
    }

    #[test]
    fn failed_runs_keep_their_views() {
        let result = finish(
            SuccessRule::ExitAndArtifact,
            &exited(2, "syntax error"),
            None,
            vec![CompilerOutput::new("Assembly", Some("DXIL"), None)],
        );
        assert!(!result.success);
        assert_eq!(result.pipeable_output, None);
        assert_eq!(result.failure_code, Some(FAILURE_CODE));
        assert_eq!(result.selected_output_index(), Some(1));
    }

    #[test]
    fn every_builtin_descriptor_is_valid() {
        let binaries = tempfile::tempdir().unwrap();
        let config = Config {
            binaries_path: binaries.path().to_path_buf(),
            ..Config::default()
        };
        for compiler in all(&config) {
            compiler.descriptor().validate().unwrap();
        }
    }
}
