extern crate base64;
extern crate elapsed;
extern crate failure;
extern crate filebuffer;
extern crate glob;
extern crate normalize_line_endings;
extern crate regex;
extern crate scoped_threadpool;
extern crate serde;
extern crate serde_json;
extern crate snailquote;
extern crate toml;
extern crate uuid;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate cfg_if;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;

pub mod arguments;
pub mod code;
pub mod compiler;
pub mod config;
pub mod drivers;
pub mod error;
pub mod jobs;
pub mod language;
pub mod parameters;
pub mod pipeline;
pub mod process;
pub mod registry;
pub mod result;
pub mod utilities;

pub use crate::arguments::{find_previous, ResolvedArgument, ShaderCompilerArguments};
pub use crate::code::{Payload, ShaderCode};
pub use crate::compiler::{CompileContext, CompilerDescriptor, ShaderCompiler};
pub use crate::config::{load_config, parse_config, Config};
pub use crate::error::{pretty_error, Error, ErrorKind, Result};
pub use crate::jobs::execute_requests;
pub use crate::parameters::{Parameter, ParameterFilter, ParameterKind};
pub use crate::pipeline::{
    CompilationStep, Pipeline, PipelineResult, ShaderCompilationRequest,
    ShaderCompilationResponse, StepState,
};
pub use crate::process::{ProcessOutput, ProcessRunner};
pub use crate::registry::{CompilerRegistry, RegistryMetadata};
pub use crate::result::{CompilerOutput, CompilerResult, CompilerResultResponse};
