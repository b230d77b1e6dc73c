use crate::arguments::ShaderCompilerArguments;
use crate::code::ShaderCode;
use crate::compiler::{CompileContext, CompilerDescriptor, ShaderCompiler};
use crate::drivers::spirv_as::TOOLS_DIR;
use crate::drivers::{finish, path_arg, SuccessRule};
use crate::error::Result;
use crate::language;
use crate::parameters::{self, Parameter};
use crate::result::CompilerResult;
use std::path::Path;

pub const NO_INDENT: &str = "NoIndent";
pub const NO_HEADER: &str = "NoHeader";
pub const RAW_ID: &str = "RawId";
pub const OFFSETS: &str = "Offsets";

pub struct SpirvDis {
    descriptor: CompilerDescriptor,
}

impl SpirvDis {
    pub fn new(binaries_path: &Path) -> Self {
        let descriptor = CompilerDescriptor::new("spirv-dis", "spirv-dis")
            .with_url("https://github.com/KhronosGroup/SPIRV-Tools")
            .with_description("Disassemble a SPIR-V binary module.")
            .with_input_languages(&[language::SPIRV])
            .with_parameter(parameters::version_parameter(binaries_path, TOOLS_DIR))
            .with_parameter(Parameter::check(NO_INDENT, "Don't indent instructions", false))
            .with_parameter(Parameter::check(NO_HEADER, "Don't output the header", false))
            .with_parameter(Parameter::check(RAW_ID, "Show raw IDs", false))
            .with_parameter(Parameter::check(OFFSETS, "Show byte offsets", false))
            .with_output_languages(&[language::SPIRV_ASSEMBLY]);

        SpirvDis { descriptor }
    }
}

pub fn cmd_args(arguments: &ShaderCompilerArguments) -> Vec<String> {
    // never colour: the output ends up in a file
    let mut args = vec!["--no-color".to_string()];

    if arguments.get_bool(NO_INDENT) {
        args.push("--no-indent".to_string());
    }

    if arguments.get_bool(NO_HEADER) {
        args.push("--no-header".to_string());
    }

    if arguments.get_bool(RAW_ID) {
        args.push("--raw-id".to_string());
    }

    if arguments.get_bool(OFFSETS) {
        args.push("--offsets".to_string());
    }

    args
}

impl ShaderCompiler for SpirvDis {
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
        let output = input.sibling("spvasm");

        let mut args = cmd_args(arguments);
        args.push("-o".to_string());
        args.push(path_arg(output.path()));
        args.push(path_arg(input.path()));

        let process = context.run(&context.binary_path(TOOLS_DIR, arguments, "spirv-dis"), &args)?;

        let artifact = output
            .read_text()?
            .map(|text| ShaderCode::text(language::SPIRV_ASSEMBLY, text));

        Ok(finish(SuccessRule::ExitAndArtifact, &process, artifact, vec![]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn flags_map_to_switches() {
        let binaries = tempfile::tempdir().unwrap();
        let dis = SpirvDis::new(binaries.path());

        let mut submitted = HashMap::new();
        submitted.insert(RAW_ID.to_string(), "true".to_string());
        submitted.insert(OFFSETS.to_string(), "TRUE".to_string());
        let arguments =
            ShaderCompilerArguments::resolve(dis.descriptor(), &submitted, language::SPIRV).unwrap();

        assert_eq!(cmd_args(&arguments), vec!["--no-color", "--raw-id", "--offsets"]);
    }
}
