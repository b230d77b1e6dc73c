use crate::arguments::ShaderCompilerArguments;
use crate::code::ShaderCode;
use crate::compiler::{CompileContext, CompilerDescriptor, ShaderCompiler};
use crate::drivers::{file_arg, finish, SuccessRule};
use crate::error::Result;
use crate::language;
use crate::parameters::{self, Parameter, INPUT_LANGUAGE_FILTER};
use crate::result::{CompilerOutput, CompilerResult};
use std::path::Path;

const TOOL: &str = "glslc";

pub const SHADER_STAGE: &str = "ShaderStage";
pub const TARGET_ENV: &str = "TargetEnv";
pub const OPTIMIZATION: &str = "Optimization";
pub const AUTO_BIND_UNIFORMS: &str = "AutoBindUniforms";
pub const AUTO_MAP_LOCATIONS: &str = "AutoMapLocations";
pub const HLSL_IOMAP: &str = "HlslIoMap";
pub const HLSL_OFFSETS: &str = "HlslOffsets";
pub const HLSL_FUNCTIONALITY1: &str = "HlslFunctionality1";

pub struct Glslc {
    descriptor: CompilerDescriptor,
}

impl Glslc {
    pub fn new(binaries_path: &Path) -> Self {
        let hlsl_only = |parameter: Parameter| {
            parameter.with_filter(INPUT_LANGUAGE_FILTER, &[language::HLSL])
        };

        let descriptor = CompilerDescriptor::new(TOOL, "glslc")
            .with_url("https://github.com/google/shaderc")
            .with_description("Shaderc command-line compiler for GLSL and HLSL to SPIR-V.")
            .with_input_languages(&[language::GLSL, language::HLSL])
            .with_parameter(parameters::version_parameter(binaries_path, TOOL))
            .with_parameter(Parameter::combo(
                SHADER_STAGE,
                "Shader stage",
                &["vert", "frag", "comp", "geom", "tesc", "tese"],
                "frag",
            ))
            .with_parameter(parameters::entry_point_parameter("main"))
            .with_parameter(Parameter::combo(
                TARGET_ENV,
                "Target environment",
                &["vulkan1.0", "vulkan1.1", "vulkan1.2", "vulkan1.3", "opengl"],
                "vulkan1.0",
            ))
            .with_parameter(Parameter::combo(
                OPTIMIZATION,
                "Optimization",
                &["-O0", "-O", "-Os"],
                "-O",
            ))
            .with_parameter(Parameter::check(AUTO_BIND_UNIFORMS, "Auto bind uniforms", false))
            .with_parameter(Parameter::check(AUTO_MAP_LOCATIONS, "Auto map locations", false))
            .with_parameter(hlsl_only(Parameter::check(HLSL_IOMAP, "HLSL IO mapping", false)))
            .with_parameter(hlsl_only(Parameter::check(HLSL_OFFSETS, "HLSL offsets", false)))
            .with_parameter(hlsl_only(Parameter::check(
                HLSL_FUNCTIONALITY1,
                "HLSL functionality1",
                false,
            )))
            .with_parameter(parameters::extra_options_parameter())
            .with_output_languages(&[language::SPIRV]);

        Glslc { descriptor }
    }
}

pub fn cmd_args(input_language: &str, arguments: &ShaderCompilerArguments) -> Vec<String> {
    let mut args = Vec::new();

    args.push("-x".to_string());
    if input_language == language::HLSL {
        args.push("hlsl".to_string());
    } else {
        args.push("glsl".to_string());
    }

    if let Some(stage) = arguments.get_string(SHADER_STAGE) {
        args.push(format!("-fshader-stage={}", stage));
    }

    if let Some(entry_point) = arguments.get_string(parameters::ENTRY_POINT) {
        args.push(format!("-fentry-point={}", entry_point));
    }

    if let Some(target) = arguments.get_string(TARGET_ENV) {
        args.push(format!("--target-env={}", target));
    }

    if let Some(optimization) = arguments.get_string(OPTIMIZATION) {
        args.push(optimization.to_string());
    }

    let flags = [
        (AUTO_BIND_UNIFORMS, "-fauto-bind-uniforms"),
        (AUTO_MAP_LOCATIONS, "-fauto-map-locations"),
        (HLSL_IOMAP, "-fhlsl-iomap"),
        (HLSL_OFFSETS, "-fhlsl-offsets"),
        (HLSL_FUNCTIONALITY1, "-fhlsl_functionality1"),
    ];
    for (name, flag) in flags.iter() {
        if arguments.is_active(name) && arguments.get_bool(name) {
            args.push(flag.to_string());
        }
    }

    args.extend(arguments.extra_options());
    args
}

impl ShaderCompiler for Glslc {
    fn descriptor(&self) -> &CompilerDescriptor {
        &self.descriptor
    }

    fn compile(
        &self,
        context: &CompileContext,
        code: &ShaderCode,
        arguments: &ShaderCompilerArguments,
        _previous: &[ShaderCompilerArguments],
    ) -> Result<CompilerResult> {
        let command = context.binary_path(TOOL, arguments, "glslc");
        let workspace = context.temp_dir()?;
        let working_dir = Some(workspace.path());

        let input = workspace.stage(code)?;
        let output = input.sibling("spv");
        let disassembly = input.sibling("spvasm");

        let mut args = cmd_args(code.language(), arguments);
        args.push("-o".to_string());
        args.push(file_arg(output.path()));
        args.push(file_arg(input.path()));

        let process = context.runner().run_in(working_dir, &command, &args)?;
        let artifact = output
            .read()?
            .map(|data| ShaderCode::binary(language::SPIRV, data));

        let mut assembly = None;
        if artifact.is_some() && process.success() {
            let mut args = cmd_args(code.language(), arguments);
            args.push("-S".to_string());
            args.push("-o".to_string());
            args.push(file_arg(disassembly.path()));
            args.push(file_arg(input.path()));
            context.runner().run_in(working_dir, &command, &args)?;
            assembly = disassembly.read_text()?;
        }

        Ok(finish(
            SuccessRule::ExitAndArtifact,
            &process,
            artifact,
            vec![CompilerOutput::new(
                "Assembly",
                Some(language::SPIRV_ASSEMBLY),
                assembly,
            )],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(input_language: &str, pairs: &[(&str, &str)]) -> ShaderCompilerArguments {
        let binaries = tempfile::tempdir().unwrap();
        let glslc = Glslc::new(binaries.path());
        let submitted: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        ShaderCompilerArguments::resolve(glslc.descriptor(), &submitted, input_language).unwrap()
    }

    #[test]
    fn hlsl_options_only_apply_to_hlsl_input() {
        let pairs = [("HlslOffsets", "true"), ("AutoBindUniforms", "true")];

        let glsl = cmd_args(language::GLSL, &resolve(language::GLSL, &pairs));
        assert_eq!(&glsl[..2], &["-x", "glsl"]);
        assert!(glsl.contains(&"-fauto-bind-uniforms".to_string()));
        assert!(!glsl.contains(&"-fhlsl-offsets".to_string()));

        let hlsl = cmd_args(language::HLSL, &resolve(language::HLSL, &pairs));
        assert_eq!(&hlsl[..2], &["-x", "hlsl"]);
        assert!(hlsl.contains(&"-fhlsl-offsets".to_string()));
    }

    #[test]
    fn stage_and_environment_are_passed_through() {
        let args = cmd_args(
            language::GLSL,
            &resolve(
                language::GLSL,
                &[("ShaderStage", "comp"), ("TargetEnv", "vulkan1.2")],
            ),
        );
        assert!(args.contains(&"-fshader-stage=comp".to_string()));
        assert!(args.contains(&"--target-env=vulkan1.2".to_string()));
        assert!(args.contains(&"-fentry-point=main".to_string()));
    }
}
