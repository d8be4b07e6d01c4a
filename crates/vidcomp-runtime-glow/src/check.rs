use vidcomp_core::{gl_error_name, EngineError};

use crate::gl::Gl;

// A lost context can report errors forever; stop draining after this many.
const MAX_DRAINED_ERRORS: usize = 32;

/// Drain the GL error queue after `op`.
///
/// Every pending error is logged; the most recent one is returned as `EngineError::GpuState`.
/// Callers run this after state-changing work (bind, upload, draw) so a failure is attributed to
/// the operation that caused it rather than to whatever runs next.
pub unsafe fn check_gl_error<G: Gl + ?Sized>(gl: &G, op: &str) -> Result<(), EngineError> {
    let mut last = glow::NO_ERROR;
    for _ in 0..MAX_DRAINED_ERRORS {
        let code = gl.get_error();
        if code == glow::NO_ERROR {
            break;
        }
        tracing::error!(op, code = format_args!("0x{code:04x}"), name = gl_error_name(code), "GL error");
        last = code;
    }

    if last == glow::NO_ERROR {
        Ok(())
    } else {
        Err(EngineError::GpuState {
            op: op.to_string(),
            code: last,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGl;

    #[test]
    fn clean_queue_is_ok() {
        let gl = FakeGl::new();
        assert!(unsafe { check_gl_error(&gl, "noop") }.is_ok());
    }

    #[test]
    fn reports_most_recent_error_and_drains_queue() {
        let gl = FakeGl::new();
        gl.push_error(glow::INVALID_ENUM);
        gl.push_error(glow::INVALID_OPERATION);

        let err = unsafe { check_gl_error(&gl, "glDrawArrays") }.unwrap_err();
        match err {
            EngineError::GpuState { op, code } => {
                assert_eq!(op, "glDrawArrays");
                assert_eq!(code, glow::INVALID_OPERATION);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(unsafe { check_gl_error(&gl, "again") }.is_ok());
    }
}
