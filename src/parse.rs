//! Cursor over the arguments of one request
//!
//! Commands pull their arguments in order; running out of arguments or
//! leaving some unconsumed is an arity error for the command being parsed.

use crate::error::{CellStoreError, Result};
use std::collections::VecDeque;
use std::str;

#[derive(Debug)]
pub(crate) struct Parse {
    command: String,
    parts: VecDeque<Vec<u8>>,
}

impl Parse {
    pub(crate) fn new(command: &str, parts: Vec<Vec<u8>>) -> Parse {
        Parse {
            command: command.to_string(),
            parts: parts.into(),
        }
    }

    fn arity(&self) -> CellStoreError {
        CellStoreError::Arity(self.command.clone())
    }

    pub(crate) fn remaining(&self) -> usize {
        self.parts.len()
    }

    pub(crate) fn next_bytes(&mut self) -> Result<Vec<u8>> {
        self.parts.pop_front().ok_or_else(|| self.arity())
    }

    pub(crate) fn next_optional(&mut self) -> Option<Vec<u8>> {
        self.parts.pop_front()
    }

    /// Next argument as text, for keywords such as `BEFORE` or `EX`
    pub(crate) fn next_string(&mut self) -> Result<String> {
        let raw = self.next_bytes()?;
        String::from_utf8(raw).map_err(|_| CellStoreError::Syntax)
    }

    pub(crate) fn next_int(&mut self) -> Result<i64> {
        parse_int(&self.next_bytes()?)
    }

    pub(crate) fn next_float(&mut self) -> Result<f64> {
        parse_float(&self.next_bytes()?)
    }

    /// All remaining arguments; at least `min` of them must be present
    pub(crate) fn rest(&mut self, min: usize) -> Result<Vec<Vec<u8>>> {
        if self.parts.len() < min {
            return Err(self.arity());
        }
        Ok(self.parts.drain(..).collect())
    }

    /// Remaining arguments as (first, second) pairs; at least one pair
    pub(crate) fn pairs(&mut self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        if self.parts.is_empty() || self.parts.len() % 2 != 0 {
            return Err(self.arity());
        }
        let mut pairs = Vec::with_capacity(self.parts.len() / 2);
        while let (Some(a), Some(b)) = (self.parts.pop_front(), self.parts.pop_front()) {
            pairs.push((a, b));
        }
        Ok(pairs)
    }

    /// Every argument must have been consumed
    pub(crate) fn finish(&self) -> Result<()> {
        if self.parts.is_empty() {
            Ok(())
        } else {
            Err(self.arity())
        }
    }
}

/// Decimal integer text: optional `-`, then digits only
pub(crate) fn parse_int(raw: &[u8]) -> Result<i64> {
    if raw.first() == Some(&b'+') {
        return Err(CellStoreError::NotAnInteger);
    }
    str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(CellStoreError::NotAnInteger)
}

/// Finite float text; `inf` and `nan` are rejected
pub(crate) fn parse_float(raw: &[u8]) -> Result<f64> {
    str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|f| f.is_finite())
        .ok_or(CellStoreError::NotAFloat)
}
