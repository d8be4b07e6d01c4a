//! Scoped "use, configure, bind" helper.

use vidcomp_core::EngineError;

use crate::gl::Gl;
use crate::program::ShaderProgram;

impl ShaderProgram {
    /// Make the program current, let `configure` write slot values, then bind everything.
    ///
    /// Any error from `use_program`, `configure` or `bind_all` is returned unchanged; `configure`
    /// must not issue GL calls of its own that change the current program.
    pub unsafe fn use_and_bind<G, F>(&mut self, gl: &G, configure: F) -> Result<(), EngineError>
    where
        G: Gl + ?Sized,
        F: FnOnce(&mut ShaderProgram) -> Result<(), EngineError>,
    {
        self.use_program(gl)?;
        configure(self)?;
        self.bind_all(gl)
    }
}
