use crate::arguments::ShaderCompilerArguments;
use crate::code::ShaderCode;
use crate::compiler::{CompileContext, CompilerDescriptor, ShaderCompiler};
use crate::drivers::{finish, path_arg, SuccessRule};
use crate::error::Result;
use crate::language;
use crate::parameters::{self, Parameter};
use crate::result::{CompilerOutput, CompilerResult};
use std::path::Path;

const TOOL: &str = "fxc";

pub const TARGET_PROFILE: &str = "TargetProfile";
pub const OPTIMIZATION: &str = "Optimization";
pub const DISABLE_VALIDATION: &str = "DisableValidation";

const STAGES: &[&str] = &["ps", "vs", "cs", "gs", "hs", "ds"];
const SHADER_MODELS: &[&str] = &["4_0", "4_1", "5_0", "5_1"];

pub struct Fxc {
    descriptor: CompilerDescriptor,
}

impl Fxc {
    pub fn new(binaries_path: &Path) -> Self {
        let profiles: Vec<String> = STAGES
            .iter()
            .flat_map(|stage| {
                SHADER_MODELS
                    .iter()
                    .map(move |model| format!("{}_{}", stage, model))
            })
            .collect();

        let descriptor = CompilerDescriptor::new(TOOL, "FXC")
            .with_url("https://docs.microsoft.com/en-us/windows/win32/direct3dtools/fxc")
            .with_description("Legacy Direct3D HLSL compiler producing DXBC.")
            .with_input_languages(&[language::HLSL])
            .with_parameter(parameters::version_parameter(binaries_path, TOOL))
            .with_parameter(parameters::entry_point_parameter("PSMain"))
            .with_parameter(Parameter::combo(
                TARGET_PROFILE,
                "Target profile",
                &profiles,
                "ps_5_0",
            ))
            .with_parameter(Parameter::combo(
                OPTIMIZATION,
                "Optimization",
                &["/Od", "/O0", "/O1", "/O2", "/O3"],
                "/O1",
            ))
            .with_parameter(Parameter::check(DISABLE_VALIDATION, "Disable validation", false))
            .with_parameter(parameters::extra_options_parameter())
            .with_output_languages(&[language::DXBC]);

        Fxc { descriptor }
    }
}

pub fn cmd_args(arguments: &ShaderCompilerArguments) -> Vec<String> {
    let mut args = Vec::new();

    args.push("/nologo".to_string());

    args.push("/E".to_string());
    args.push(arguments.get_string(parameters::ENTRY_POINT).unwrap_or("main").to_string());

    args.push("/T".to_string());
    args.push(arguments.get_string(TARGET_PROFILE).unwrap_or("ps_5_0").to_string());

    if let Some(optimization) = arguments.get_string(OPTIMIZATION) {
        args.push(optimization.to_string());
    }

    if arguments.get_bool(DISABLE_VALIDATION) {
        args.push("/Vd".to_string());
    }

    args.extend(arguments.extra_options());
    args
}

impl ShaderCompiler for Fxc {
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
        let output = input.sibling("o");
        let listing = input.sibling("asm");

        let mut args = cmd_args(arguments);
        args.push("/Fo".to_string());
        args.push(path_arg(output.path()));
        args.push("/Fc".to_string());
        args.push(path_arg(listing.path()));
        args.push(path_arg(input.path()));

        let process = context.run(&context.binary_path(TOOL, arguments, "fxc"), &args)?;

        // fxc under wine does not report its exit code reliably
        let artifact = output
            .read()?
            .map(|data| ShaderCode::binary(language::DXBC, data));
        let assembly = CompilerOutput::new("Assembly", Some(language::DXBC), listing.read_text()?);

        Ok(finish(
            SuccessRule::ArtifactOnly,
            &process,
            artifact,
            vec![assembly],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_build_a_pixel_shader_command() {
        let binaries = tempfile::tempdir().unwrap();
        let fxc = Fxc::new(binaries.path());
        assert_eq!(fxc.descriptor().fixed_output_language(), Some(language::DXBC));

        let mut submitted = HashMap::new();
        submitted.insert(DISABLE_VALIDATION.to_string(), "True".to_string());
        let arguments =
            ShaderCompilerArguments::resolve(fxc.descriptor(), &submitted, language::HLSL).unwrap();

        assert_eq!(
            cmd_args(&arguments),
            vec!["/nologo", "/E", "PSMain", "/T", "ps_5_0", "/O1", "/Vd"]
        );
    }
}
