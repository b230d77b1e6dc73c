//! Apple's Metal toolchain: the `metal` front end, the `air-lld` linker that
//! packages AIR into a metallib, and the shader converter that lowers DXIL.

use crate::arguments::{find_previous, ShaderCompilerArguments};
use crate::code::ShaderCode;
use crate::compiler::{CompileContext, CompilerDescriptor, ShaderCompiler};
use crate::drivers::{finish, path_arg, SuccessRule};
use crate::error::Result;
use crate::language;
use crate::parameters::{self, Parameter};
use crate::result::{CompilerOutput, CompilerResult, OUTPUT};
use std::path::Path;

const METAL_TOOL: &str = "metal";
const CONVERTER_TOOL: &str = "metal-shader-converter";

const URL: &str = "https://developer.apple.com/documentation/metal/shader_authoring";

pub const METAL_VERSION: &str = "MetalVersion";

/// Language standard passed to `-std=`, with the minimum OS version
/// `air-lld` has to target for it.
struct PlatformVersion {
    standard: &'static str,
    platform: &'static str,
    version_min: &'static str,
}

const PLATFORM_VERSIONS: &[PlatformVersion] = &[
    PlatformVersion { standard: "macos-metal1.0", platform: "macosx", version_min: "10.11.0" },
    PlatformVersion { standard: "macos-metal1.1", platform: "macosx", version_min: "10.11.0" },
    PlatformVersion { standard: "macos-metal1.2", platform: "macosx", version_min: "10.12.0" },
    PlatformVersion { standard: "macos-metal2.0", platform: "macosx", version_min: "10.13.0" },
    PlatformVersion { standard: "macos-metal2.1", platform: "macosx", version_min: "10.14.0" },
    PlatformVersion { standard: "macos-metal2.2", platform: "macosx", version_min: "10.15.0" },
    PlatformVersion { standard: "macos-metal2.3", platform: "macosx", version_min: "11.0.0" },
    PlatformVersion { standard: "macos-metal2.4", platform: "macosx", version_min: "12.0.0" },
    PlatformVersion { standard: "ios-metal1.0", platform: "ios", version_min: "8.0.0" },
    PlatformVersion { standard: "ios-metal1.1", platform: "ios", version_min: "9.0.0" },
    PlatformVersion { standard: "ios-metal1.2", platform: "ios", version_min: "10.0.0" },
    PlatformVersion { standard: "ios-metal2.0", platform: "ios", version_min: "11.0.0" },
    PlatformVersion { standard: "ios-metal2.1", platform: "ios", version_min: "12.0.0" },
    PlatformVersion { standard: "ios-metal2.2", platform: "ios", version_min: "13.0.0" },
    PlatformVersion { standard: "ios-metal2.3", platform: "ios", version_min: "14.0.0" },
    PlatformVersion { standard: "ios-metal2.4", platform: "ios", version_min: "15.0.0" },
    PlatformVersion { standard: "metal3.0", platform: "macosx", version_min: "13.0.0" },
    PlatformVersion { standard: "metal3.1", platform: "macosx", version_min: "14.0.0" },
];

fn platform_version(standard: &str) -> Option<&'static PlatformVersion> {
    PLATFORM_VERSIONS
        .iter()
        .find(|version| version.standard == standard)
}

/// `air-lld` switches selecting the deployment target for a language standard.
pub fn link_target_args(standard: &str) -> Option<Vec<String>> {
    platform_version(standard).map(|version| {
        vec![
            "-arch".to_string(),
            "air64".to_string(),
            format!("-{}_version_min", version.platform),
            version.version_min.to_string(),
        ]
    })
}

pub struct Metal {
    descriptor: CompilerDescriptor,
}

impl Metal {
    pub fn new(binaries_path: &Path) -> Self {
        let standards: Vec<&str> = PLATFORM_VERSIONS
            .iter()
            .map(|version| version.standard)
            .collect();

        let descriptor = CompilerDescriptor::new("metal", "Metal")
            .with_url(URL)
            .with_description("Compiles Metal Shading Language to Apple IR (AIR).")
            .with_input_languages(&[language::METAL])
            .with_parameter(parameters::version_parameter(binaries_path, METAL_TOOL))
            .with_parameter(Parameter::combo(
                METAL_VERSION,
                "Metal language version",
                &standards,
                "metal3.1",
            ))
            .with_output_languages(&[language::METAL_IR]);

        Metal { descriptor }
    }
}

impl ShaderCompiler for Metal {
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
        let command = context.binary_path(METAL_TOOL, arguments, "metal");
        let include_path = command
            .parent()
            .map(|directory| directory.join("include").join("metal"))
            .unwrap_or_default();
        let standard = format!(
            "-std={}",
            arguments.get_string(METAL_VERSION).unwrap_or("metal3.1")
        );

        let input = context.temp_file(code)?;
        let listing = input.sibling("ll");
        let air = input.sibling("air");

        // first pass for the readable LLVM listing, second for the AIR binary;
        // diagnostics come from the first
        let process = context.run(
            &command,
            &[
                standard.clone(),
                "-S".to_string(),
                "-emit-llvm".to_string(),
                "-I".to_string(),
                path_arg(&include_path),
                "-o".to_string(),
                path_arg(listing.path()),
                path_arg(input.path()),
            ],
        )?;
        let assembly = listing.read_text()?;

        let mut artifact = None;
        if assembly.is_some() {
            context.run(
                &command,
                &[
                    standard,
                    "-I".to_string(),
                    path_arg(&include_path),
                    "-o".to_string(),
                    path_arg(air.path()),
                    "-c".to_string(),
                    path_arg(input.path()),
                ],
            )?;
            artifact = air
                .read()?
                .map(|data| ShaderCode::binary(language::METAL_IR, data));
        }

        Ok(finish(
            SuccessRule::ArtifactOnly,
            &process,
            artifact,
            vec![CompilerOutput::new(
                "Assembly",
                Some(language::METAL_IR),
                assembly,
            )],
        ))
    }
}

pub struct MetalLib {
    descriptor: CompilerDescriptor,
}

impl MetalLib {
    pub fn new(binaries_path: &Path) -> Self {
        let descriptor = CompilerDescriptor::new("metallib", "Metallib")
            .with_url(URL)
            .with_description("Links Apple IR into a Metal library.")
            .with_input_languages(&[language::METAL_IR])
            .with_parameter(parameters::version_parameter(binaries_path, METAL_TOOL))
            .with_output_languages(&[language::METAL_LIB]);

        MetalLib { descriptor }
    }
}

impl ShaderCompiler for MetalLib {
    fn descriptor(&self) -> &CompilerDescriptor {
        &self.descriptor
    }

    fn compile(
        &self,
        context: &CompileContext,
        code: &ShaderCode,
        arguments: &ShaderCompilerArguments,
        previous: &[ShaderCompilerArguments],
    ) -> Result<CompilerResult> {
        let standard = find_previous(previous, "metal").and_then(|metal| metal.get_string(METAL_VERSION));
        let standard = match standard {
            Some(standard) => standard,
            None => {
                return Ok(CompilerResult::validation_failure(
                    "metallib needs an earlier metal step to know the target platform",
                ));
            }
        };
        let mut args = match link_target_args(standard) {
            Some(args) => args,
            None => {
                return Ok(CompilerResult::validation_failure(format!(
                    "no deployment target known for Metal version '{}'",
                    standard
                )));
            }
        };

        let input = context.temp_file(code)?;
        let output = input.sibling("metallib");

        args.push("-o".to_string());
        args.push(path_arg(output.path()));
        args.push(path_arg(input.path()));

        let process = context.run(&context.binary_path(METAL_TOOL, arguments, "air-lld"), &args)?;

        // air-lld reports problems on stderr without failing
        let artifact = if process.stderr.trim().is_empty() {
            output
                .read()?
                .map(|data| ShaderCode::binary(language::METAL_LIB, data))
        } else {
            None
        };

        let mut result = finish(SuccessRule::ArtifactOnly, &process, artifact, vec![]);
        if result.success {
            for entry in result.outputs.iter_mut() {
                if entry.display_name == OUTPUT {
                    entry.value =
                        Some("Compilation successful; download the binary below.".to_string());
                }
            }
        }
        Ok(result)
    }
}

pub struct MetalShaderConverter {
    descriptor: CompilerDescriptor,
}

impl MetalShaderConverter {
    pub fn new(binaries_path: &Path) -> Self {
        let descriptor = CompilerDescriptor::new("metal-shaderconverter", "Metal Shader Converter")
            .with_url("https://developer.apple.com/metal/shader-converter/")
            .with_description("Converts DXIL into bytecode that can be loaded into Metal.")
            .with_input_languages(&[language::DXIL])
            .with_parameter(parameters::version_parameter(binaries_path, CONVERTER_TOOL))
            .with_parameter(parameters::extra_options_parameter())
            .with_output_languages(&[language::METAL_IR]);

        MetalShaderConverter { descriptor }
    }
}

impl ShaderCompiler for MetalShaderConverter {
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
        let output = input.sibling("metallib");

        let mut args = vec![format!("-o={}", path_arg(output.path()))];
        args.extend(arguments.extra_options());
        args.push(path_arg(input.path()));

        let process = context.run(
            &context.binary_path(CONVERTER_TOOL, arguments, "metal-shaderconverter"),
            &args,
        )?;

        let artifact = output
            .read()?
            .map(|data| ShaderCode::binary(language::METAL_IR, data));

        let mut disassembly = None;
        if artifact.is_some() {
            let objdump = context.run(
                &context.binary_path(CONVERTER_TOOL, arguments, "metal-objdump"),
                &["--disassemble".to_string(), path_arg(output.path())],
            )?;
            disassembly = Some(objdump.stdout);
        }

        Ok(finish(
            SuccessRule::ArtifactOnly,
            &process,
            artifact,
            vec![CompilerOutput::new(
                "Assembly",
                Some(language::METAL_IR),
                disassembly,
            )],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessRunner;
    use std::collections::HashMap;

    #[cfg(unix)]
    fn install_tool(binaries: &Path, executable: &str, script: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let directory = binaries.join(METAL_TOOL).join(parameters::DEFAULT_VERSION);
        std::fs::create_dir_all(&directory).unwrap();
        let path = directory.join(executable);
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    const WRITE_AFTER_O: &str = r#"out=""; prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
"#;

    #[test]
    fn every_language_standard_has_a_link_target() {
        let binaries = tempfile::tempdir().unwrap();
        let metal = Metal::new(binaries.path());
        let parameter = metal.descriptor().parameter(METAL_VERSION).unwrap();
        for standard in &parameter.options {
            assert!(link_target_args(standard).is_some(), "{}", standard);
        }
        assert_eq!(
            link_target_args("ios-metal2.0").unwrap(),
            vec!["-arch", "air64", "-ios_version_min", "11.0.0"]
        );
        assert_eq!(link_target_args("metal9.9"), None);
    }

    #[cfg(unix)]
    #[test]
    fn metal_reports_the_listing_pass_diagnostics() {
        let root = tempfile::tempdir().unwrap();
        let binaries = root.path().join("binaries");
        install_tool(
            &binaries,
            "metal",
            &format!(
                r#"#!/bin/sh
{}case " $* " in
  *" -S "*) echo "listing: implicit conversion" 1>&2; echo "; ModuleID" > "$out" ;;
  *) echo "object pass" 1>&2; printf 'AIR' > "$out" ;;
esac
"#,
                WRITE_AFTER_O
            ),
        );
        let metal = Metal::new(&binaries);
        let context =
            CompileContext::with_runner(&binaries, &root.path().join("temp"), ProcessRunner::default());
        let arguments =
            ShaderCompilerArguments::resolve(metal.descriptor(), &HashMap::new(), language::METAL)
                .unwrap();

        let result = metal
            .compile(&context, &ShaderCode::text(language::METAL, "kernel void k() {}"), &arguments, &[])
            .unwrap();
        assert!(result.success);
        let output = result
            .outputs
            .iter()
            .find(|entry| entry.display_name == OUTPUT)
            .unwrap();
        assert_eq!(output.value.as_ref().unwrap(), "listing: implicit conversion");
    }

    #[cfg(unix)]
    #[test]
    fn metallib_ignores_the_exit_code_when_stderr_is_clean() {
        let root = tempfile::tempdir().unwrap();
        let binaries = root.path().join("binaries");
        install_tool(
            &binaries,
            "air-lld",
            &format!("#!/bin/sh\n{}printf 'MTLB' > \"$out\"\nexit 3\n", WRITE_AFTER_O),
        );
        let metal = Metal::new(&binaries);
        let metallib = MetalLib::new(&binaries);
        let context =
            CompileContext::with_runner(&binaries, &root.path().join("temp"), ProcessRunner::default());
        let metal_arguments =
            ShaderCompilerArguments::resolve(metal.descriptor(), &HashMap::new(), language::METAL)
                .unwrap();
        let arguments =
            ShaderCompilerArguments::resolve(metallib.descriptor(), &HashMap::new(), language::METAL_IR)
                .unwrap();

        let result = metallib
            .compile(
                &context,
                &ShaderCode::binary(language::METAL_IR, b"AIR".to_vec()),
                &arguments,
                &[metal_arguments],
            )
            .unwrap();
        assert!(result.success);
        assert_eq!(
            result.pipeable_output.as_ref().map(|code| code.as_bytes().to_vec()),
            Some(b"MTLB".to_vec())
        );
    }

    #[test]
    fn metallib_without_a_metal_step_fails_without_running() {
        let root = tempfile::tempdir().unwrap();
        let metallib = MetalLib::new(root.path());
        let context =
            CompileContext::with_runner(root.path(), &root.path().join("temp"), ProcessRunner::default());
        let arguments =
            ShaderCompilerArguments::resolve(metallib.descriptor(), &HashMap::new(), language::METAL_IR)
                .unwrap();

        let result = metallib
            .compile(
                &context,
                &ShaderCode::binary(language::METAL_IR, vec![0xde, 0xc0]),
                &arguments,
                &[],
            )
            .unwrap();
        assert!(!result.success);
        assert!(!root.path().join("temp").exists());
    }
}
