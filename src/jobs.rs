use crate::compiler::CompileContext;
use crate::error::{Error, Result};
use crate::pipeline::{Pipeline, PipelineResult, ShaderCompilationRequest};
use crate::registry::CompilerRegistry;
use scoped_threadpool::Pool;

pub struct PipelineWork<'a> {
    pub request: &'a ShaderCompilationRequest,
    pub result: Result<PipelineResult>,
}

/// Execute independent requests on a pool of `thread_count` workers sharing
/// the registry and context. Results come back in request order.
pub fn execute_requests(
    registry: &CompilerRegistry,
    context: &CompileContext,
    requests: &[ShaderCompilationRequest],
    thread_count: u32,
) -> Vec<Result<PipelineResult>> {
    let mut work_items: Vec<PipelineWork<'_>> = requests
        .iter()
        .map(|request| PipelineWork {
            request,
            result: Err(Error::bug("request was never executed")),
        })
        .collect();

    let mut pool = Pool::new(thread_count.max(1));
    pool.scoped(|scoped| {
        for work_item in &mut work_items {
            scoped.execute(move || {
                let pipeline = Pipeline::new(registry, context);
                work_item.result = pipeline.execute(work_item.request);
            });
        }
    });

    work_items.into_iter().map(|work| work.result).collect()
}
