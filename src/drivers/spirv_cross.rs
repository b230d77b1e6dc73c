use crate::arguments::ShaderCompilerArguments;
use crate::code::ShaderCode;
use crate::compiler::{CompileContext, CompilerDescriptor, ShaderCompiler};
use crate::drivers::{finish, path_arg, SuccessRule};
use crate::error::Result;
use crate::language;
use crate::parameters::{self, Parameter, OUTPUT_LANGUAGE};
use crate::result::CompilerResult;
use std::path::Path;

const TOOL: &str = "spirv-cross";

pub const GLSL_VERSION: &str = "GlslVersion";
pub const GLSL_ES: &str = "GlslEs";
pub const VULKAN_SEMANTICS: &str = "VulkanSemantics";
pub const SHADER_MODEL: &str = "ShaderModel";
pub const MSL_VERSION: &str = "MslVersion";
pub const MSL_IOS: &str = "MslIos";
pub const FLIP_VERT_Y: &str = "FlipVertY";

pub struct SpirvCross {
    descriptor: CompilerDescriptor,
}

impl SpirvCross {
    pub fn new(binaries_path: &Path) -> Self {
        let descriptor = CompilerDescriptor::new(TOOL, "SPIRV-Cross")
            .with_url("https://github.com/KhronosGroup/SPIRV-Cross")
            .with_description("Translates SPIR-V into GLSL, HLSL or Metal Shading Language.")
            .with_input_languages(&[language::SPIRV])
            .with_parameter(parameters::version_parameter(binaries_path, TOOL))
            .with_parameter(
                Parameter::combo(
                    GLSL_VERSION,
                    "GLSL version",
                    &["300", "310", "330", "400", "410", "420", "430", "450", "460"],
                    "450",
                )
                .with_filter(OUTPUT_LANGUAGE, &[language::GLSL]),
            )
            .with_parameter(
                Parameter::check(GLSL_ES, "OpenGL ES", false)
                    .with_filter(OUTPUT_LANGUAGE, &[language::GLSL]),
            )
            .with_parameter(
                Parameter::check(VULKAN_SEMANTICS, "Vulkan semantics", false)
                    .with_filter(OUTPUT_LANGUAGE, &[language::GLSL]),
            )
            .with_parameter(
                Parameter::combo(
                    SHADER_MODEL,
                    "Shader model",
                    &["30", "40", "50", "51", "60"],
                    "50",
                )
                .with_filter(OUTPUT_LANGUAGE, &[language::HLSL]),
            )
            .with_parameter(
                Parameter::combo(
                    MSL_VERSION,
                    "MSL version",
                    &["10200", "20000", "20100", "20200", "20300", "30000"],
                    "20000",
                )
                .with_filter(OUTPUT_LANGUAGE, &[language::METAL]),
            )
            .with_parameter(
                Parameter::check(MSL_IOS, "iOS", false)
                    .with_filter(OUTPUT_LANGUAGE, &[language::METAL]),
            )
            .with_parameter(Parameter::check(FLIP_VERT_Y, "Flip vertex Y", false))
            .with_parameter(parameters::extra_options_parameter())
            .with_output_languages(&[language::GLSL, language::HLSL, language::METAL]);

        SpirvCross { descriptor }
    }
}

pub fn cmd_args(arguments: &ShaderCompilerArguments) -> Vec<String> {
    let mut args = Vec::new();

    match arguments.output_language() {
        Some(language::HLSL) => {
            args.push("--hlsl".to_string());
            if let Some(model) = arguments.get_string(SHADER_MODEL) {
                args.push("--shader-model".to_string());
                args.push(model.to_string());
            }
        }
        Some(language::METAL) => {
            args.push("--msl".to_string());
            if let Some(version) = arguments.get_string(MSL_VERSION) {
                args.push("--msl-version".to_string());
                args.push(version.to_string());
            }
            if arguments.get_bool(MSL_IOS) {
                args.push("--msl-ios".to_string());
            }
        }
        _ => {
            if let Some(version) = arguments.get_string(GLSL_VERSION) {
                args.push("--version".to_string());
                args.push(version.to_string());
            }
            if arguments.get_bool(GLSL_ES) {
                args.push("--es".to_string());
            } else {
                args.push("--no-es".to_string());
            }
            if arguments.get_bool(VULKAN_SEMANTICS) {
                args.push("--vulkan-semantics".to_string());
            }
        }
    }

    if arguments.get_bool(FLIP_VERT_Y) {
        args.push("--flip-vert-y".to_string());
    }

    args.extend(arguments.extra_options());
    args
}

impl ShaderCompiler for SpirvCross {
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
        let output_language = arguments.output_language().unwrap_or(language::GLSL);
        let extension = language::file_extension(output_language).unwrap_or("txt");

        let input = context.temp_file(code)?;
        let output = input.sibling(extension);

        let mut args = vec![path_arg(input.path())];
        args.extend(cmd_args(arguments));
        args.push("--output".to_string());
        args.push(path_arg(output.path()));

        let process = context.run(&context.binary_path(TOOL, arguments, "spirv-cross"), &args)?;

        let artifact = output
            .read_text()?
            .map(|text| ShaderCode::text(output_language, text));

        Ok(finish(SuccessRule::ExitAndArtifact, &process, artifact, vec![]))
    }
}
