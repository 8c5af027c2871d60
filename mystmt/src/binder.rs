//! Parameter binder.
use bytes::Bytes;

use crate::{
    ErrorKind, Result,
    bind::{ArityMismatch, Param},
    encode::Encoded,
};

/// Bound parameters of a statement.
///
/// Parameters are encoded when bound, the caller buffers are not kept.
#[derive(Debug, Default)]
pub(crate) struct Binder {
    params: Vec<Encoded>,
    bound: bool,
    send_types: bool,
}

impl Binder {
    /// Bind parameters, replacing previous binding.
    pub(crate) fn bind(&mut self, params: &[Param], expect: usize) -> Result<()> {
        if params.len() != expect {
            return Err(ArityMismatch::params(expect, params.len()).into());
        }

        let params = params
            .iter()
            .enumerate()
            .map(|(i, param)| Encoded::new(param).map_err(|e| e.at(i)))
            .collect::<Result<Vec<_>, _>>()?;

        self.params = params;
        self.bound = true;
        self.send_types = true;
        Ok(())
    }

    /// A statement without parameters is always bound.
    pub(crate) fn is_bound(&self, expect: usize) -> bool {
        self.bound || expect == 0
    }

    /// Mark a parameter as sent with long data.
    ///
    /// Returns the bound value when this is the first chunk and the value is
    /// not empty, it has to be sent before the chunk.
    pub(crate) fn long_data(&mut self, index: usize, expect: usize) -> Result<Option<Bytes>> {
        if index >= expect {
            return Err(ErrorKind::InvalidParamIndex(index).into());
        }
        if !self.bound {
            return Err(ErrorKind::ParamsNotBound.into());
        }

        let param = &mut self.params[index];
        if !param.field_type().is_var_len() {
            return Err(ErrorKind::LongDataNotAllowed(index).into());
        }
        if param.is_long_data() {
            return Ok(None);
        }

        param.set_long_data(true);
        let base = param.content();
        Ok((!base.is_empty()).then_some(base))
    }

    /// Parameters for the next execute, and whether their types are sent.
    pub(crate) fn execute_params(&self) -> (&[Encoded], bool) {
        (&self.params, self.send_types)
    }

    /// Called after a successful execute.
    ///
    /// Types are sent again only after a rebind, long data is per execute.
    pub(crate) fn executed(&mut self) {
        self.send_types = false;
        self.clear_long_data();
    }

    /// Forget long data, the server dropped it.
    pub(crate) fn clear_long_data(&mut self) {
        for param in &mut self.params {
            param.set_long_data(false);
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
