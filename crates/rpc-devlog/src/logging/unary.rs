//! Unary call logging.
//!
//! One record per call, built in a pooled buffer while the call runs and
//! written with a single sink write once it completes. The request is rendered
//! before it is handed to `next`; nothing is locked while `next` runs.

use std::sync::Arc;

use super::format;
use super::logger::LoggerInner;
use super::types::CallContext;
use crate::error::BoxError;
use crate::interceptor::{UnaryFunc, UnaryRequest, UnaryResponse, unary_fn};

pub(crate) fn wrap(logger: Arc<LoggerInner>, next: UnaryFunc) -> UnaryFunc {
    unary_fn(move |req: UnaryRequest| {
        let logger = Arc::clone(&logger);
        let next = Arc::clone(&next);
        async move {
            let ctx = CallContext::for_call(&req.spec, &req.peer, &req.headers, &logger.config);
            let mut record = logger.pool.acquire();

            logger.write_call_header(&mut record, &ctx, &req.headers);
            format::write_message_block(
                &mut record,
                "Request",
                req.message.as_ref(),
                logger.formatter(),
            );

            let result = next(req).await;

            write_outcome(&logger, &mut record, &ctx, &result);
            logger.emit(&record);
            result
        }
    })
}

fn write_outcome(
    logger: &LoggerInner,
    buf: &mut String,
    ctx: &CallContext,
    result: &Result<UnaryResponse, BoxError>,
) {
    match result {
        Ok(response) => {
            logger.write_response_headers(buf, &response.headers);
            format::write_message_block(buf, "Response", response.message.as_ref(), logger.formatter());
        }
        Err(err) => logger.write_error(buf, &**err),
    }
    format::write_duration(buf, "Completed in", ctx.elapsed());
    buf.push('\n');
}
