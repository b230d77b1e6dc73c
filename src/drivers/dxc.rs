use crate::arguments::ShaderCompilerArguments;
use crate::code::ShaderCode;
use crate::compiler::{CompileContext, CompilerDescriptor, ShaderCompiler};
use crate::drivers::{finish, path_arg, SuccessRule};
use crate::error::Result;
use crate::language;
use crate::parameters::{self, Parameter};
use crate::result::{CompilerOutput, CompilerResult};
use std::path::Path;

const TOOL: &str = "dxc";

pub const TARGET_PROFILE: &str = "TargetProfile";
pub const HLSL_VERSION: &str = "HlslVersion";
pub const OPTIMIZATION: &str = "Optimization";
pub const DENORM: &str = "Denorm";
pub const SPIRV_TARGET: &str = "SpirvTarget";

const STAGES: &[&str] = &["ps", "vs", "cs", "gs", "hs", "ds", "lib"];
const SHADER_MODELS: &[&str] = &["6_0", "6_1", "6_2", "6_3", "6_4", "6_5", "6_6", "6_7"];

/// Parse `<stage>_<major>_<minor>` into the shader model.
pub fn shader_model(profile: &str) -> Option<(u32, u32)> {
    let mut parts = profile.rsplitn(3, '_');
    let minor = parts.next()?.parse().ok()?;
    let major = parts.next()?.parse().ok()?;
    parts.next()?;
    Some((major, minor))
}

fn target_profiles() -> Vec<String> {
    STAGES
        .iter()
        .flat_map(|stage| {
            SHADER_MODELS
                .iter()
                .map(move |model| format!("{}_{}", stage, model))
        })
        .collect()
}

pub struct Dxc {
    descriptor: CompilerDescriptor,
}

impl Dxc {
    pub fn new(binaries_path: &Path) -> Self {
        let profiles = target_profiles();
        // -denorm is only accepted from shader model 6.2 onwards
        let denorm_profiles: Vec<&String> = profiles
            .iter()
            .filter(|profile| shader_model(profile).map_or(false, |model| model >= (6, 2)))
            .collect();

        let descriptor = CompilerDescriptor::new(TOOL, "DXC")
            .with_url("https://github.com/Microsoft/DirectXShaderCompiler")
            .with_description("LLVM based HLSL compiler producing DXIL or SPIR-V.")
            .with_input_languages(&[language::HLSL])
            .with_parameter(parameters::version_parameter(binaries_path, TOOL))
            .with_parameter(parameters::entry_point_parameter("PSMain"))
            .with_parameter(Parameter::combo(
                TARGET_PROFILE,
                "Target profile",
                &profiles,
                "ps_6_0",
            ))
            .with_parameter(Parameter::combo(
                HLSL_VERSION,
                "HLSL version",
                &["2016", "2017", "2018", "2021"],
                "2018",
            ))
            .with_parameter(Parameter::combo(
                OPTIMIZATION,
                "Optimization",
                &["-Od", "-O0", "-O1", "-O2", "-O3"],
                "-O3",
            ))
            .with_parameter(
                Parameter::combo(DENORM, "Denormals", &["any", "preserve", "ftz"], "any")
                    .with_filter(TARGET_PROFILE, &denorm_profiles),
            )
            .with_parameter(
                Parameter::combo(
                    SPIRV_TARGET,
                    "SPIR-V target environment",
                    &["vulkan1.0", "vulkan1.1", "vulkan1.2", "vulkan1.3"],
                    "vulkan1.0",
                )
                .with_filter(parameters::OUTPUT_LANGUAGE, &[language::SPIRV]),
            )
            .with_parameter(parameters::extra_options_parameter())
            .with_output_languages(&[language::DXIL, language::SPIRV]);

        Dxc { descriptor }
    }
}

/// Command-line switches for everything but the file paths.
pub fn cmd_args(arguments: &ShaderCompilerArguments) -> Vec<String> {
    let mut args = Vec::new();

    let profile = arguments.get_string(TARGET_PROFILE).unwrap_or("ps_6_0");
    if !profile.starts_with("lib_") {
        args.push("-E".to_string());
        args.push(arguments.get_string(parameters::ENTRY_POINT).unwrap_or("main").to_string());
    }

    args.push("-T".to_string());
    args.push(profile.to_string());

    if let Some(version) = arguments.get_string(HLSL_VERSION) {
        args.push("-HV".to_string());
        args.push(version.to_string());
    }

    if let Some(optimization) = arguments.get_string(OPTIMIZATION) {
        args.push(optimization.to_string());
    }

    if arguments.is_active(DENORM) {
        if let Some(denorm) = arguments.get_string(DENORM) {
            args.push("-denorm".to_string());
            args.push(denorm.to_string());
        }
    }

    if arguments.output_language() == Some(language::SPIRV) {
        args.push("-spirv".to_string());
        if let Some(target) = arguments.get_string(SPIRV_TARGET) {
            args.push(format!("-fspv-target-env={}", target));
        }
    }

    args.extend(arguments.extra_options());
    args
}

impl ShaderCompiler for Dxc {
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
        let output_language = arguments.output_language().unwrap_or(language::DXIL);

        let input = context.temp_file(code)?;
        let output = input.sibling("o");
        let listing = input.sibling("asm");

        let mut args = cmd_args(arguments);
        args.push("-Fo".to_string());
        args.push(path_arg(output.path()));
        args.push("-Fc".to_string());
        args.push(path_arg(listing.path()));
        args.push(path_arg(input.path()));

        let process = context.run(&context.binary_path(TOOL, arguments, "dxc"), &args)?;

        let artifact = output
            .read()?
            .map(|data| ShaderCode::binary(output_language, data));
        let assembly = CompilerOutput::new("Assembly", Some(output_language), listing.read_text()?);

        Ok(finish(
            SuccessRule::ExitAndArtifact,
            &process,
            artifact,
            vec![assembly],
        ))
    }
}
