use crate::arguments::ShaderCompilerArguments;
use crate::code::ShaderCode;
use crate::compiler::{CompileContext, CompilerDescriptor, ShaderCompiler};
use crate::drivers::{finish, path_arg, SuccessRule};
use crate::error::Result;
use crate::language;
use crate::parameters::{self, Parameter};
use crate::result::CompilerResult;
use std::path::Path;

/// spirv-as and spirv-dis ship together in the SPIRV-Tools directory.
pub const TOOLS_DIR: &str = "spirv-tools";

pub const TARGET_ENV: &str = "TargetEnv";
pub const PRESERVE_NUMERIC_IDS: &str = "PreserveNumericIds";

pub struct SpirvAs {
    descriptor: CompilerDescriptor,
}

impl SpirvAs {
    pub fn new(binaries_path: &Path) -> Self {
        let descriptor = CompilerDescriptor::new("spirv-as", "spirv-as")
            .with_url("https://github.com/KhronosGroup/SPIRV-Tools")
            .with_description("Create a SPIR-V binary module from SPIR-V assembly text.")
            .with_input_languages(&[language::SPIRV_ASSEMBLY])
            .with_parameter(parameters::version_parameter(binaries_path, TOOLS_DIR))
            .with_parameter(Parameter::combo(
                TARGET_ENV,
                "Target environment",
                &[
                    "spv1.0",
                    "spv1.3",
                    "spv1.5",
                    "spv1.6",
                    "vulkan1.0",
                    "vulkan1.1",
                    "vulkan1.2",
                    "vulkan1.3",
                ],
                "vulkan1.0",
            ))
            .with_parameter(Parameter::check(
                PRESERVE_NUMERIC_IDS,
                "Preserve numeric IDs",
                false,
            ))
            .with_output_languages(&[language::SPIRV]);

        SpirvAs { descriptor }
    }
}

impl ShaderCompiler for SpirvAs {
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
        let input = context.temp_file(code)?;
        let output = input.sibling("spv");

        let mut args = Vec::new();
        if let Some(target) = arguments.get_string(TARGET_ENV) {
            args.push(format!("--target-env={}", target));
        }
        if arguments.get_bool(PRESERVE_NUMERIC_IDS) {
            args.push("--preserve-numeric-ids".to_string());
        }
        args.push("-o".to_string());
        args.push(path_arg(output.path()));
        args.push(path_arg(input.path()));

        let process = context.run(&context.binary_path(TOOLS_DIR, arguments, "spirv-as"), &args)?;

        let artifact = output
            .read()?
            .map(|data| ShaderCode::binary(language::SPIRV, data));

        Ok(finish(SuccessRule::ExitAndArtifact, &process, artifact, vec![]))
    }
}
