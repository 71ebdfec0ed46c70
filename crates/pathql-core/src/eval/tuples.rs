//! Input tuple construction.

use std::rc::Rc;

use super::executor::{EvalContext, Evaluator, InputTuple};
use crate::error::Error;
use crate::path::Path;
use crate::scope::Analysis;

impl Evaluator<'_> {
    /// Extend the current tuple with one column per input path.
    ///
    /// Inputs are bound left to right; each is evaluated with the inputs
    /// before it in scope, so later paths see earlier bindings. A row whose
    /// input is empty is dropped unless the path is always optional, in
    /// which case it is kept with `None`.
    pub(crate) fn build_tuples(
        &self,
        inputs: &[Path],
        analysis: &Analysis,
        ctx: &EvalContext,
    ) -> Result<Vec<InputTuple>, Error> {
        let mut rows = vec![ctx.tuple.clone()];
        for (i, path) in inputs.iter().enumerate() {
            let mut bound = ctx.inputs.as_ref().clone();
            bound.extend_from_slice(&inputs[..i]);
            let bound = Rc::new(bound);

            let mut next = Vec::new();
            for row in rows {
                let values = self.eval_path(path, &ctx.with_row(Rc::clone(&bound), row.clone()))?;
                if values.is_empty() {
                    if analysis.always_optional(path) {
                        let mut row = row;
                        row.push(None);
                        next.push(row);
                    }
                    continue;
                }
                for value in values {
                    let mut extended = row.clone();
                    extended.push(Some(value));
                    next.push(extended);
                }
                self.check_rows(next.len(), "input tuples")?;
            }
            rows = next;
        }
        Ok(rows)
    }
}
