#![forbid(unsafe_code)]

//! Simulated paginated backend.

use fetchstate::{IntoRequestError, RequestError};
use serde::Serialize;
use thiserror::Error;

/// Wire-level page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub offset: u32,
    pub limit: u32,
}

/// Response envelope; `data` is the business payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub code: i32,
    pub total: u32,
    pub data: Vec<String>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("offset {offset} is past the end of the catalog ({total} items)")]
    OutOfRange { offset: u32, total: u32 },
    #[error("backend unavailable for offset {offset}")]
    Unavailable { offset: u32 },
}

impl IntoRequestError for CatalogError {
    fn into_request_error(self) -> RequestError {
        RequestError::failed(self)
    }
}

pub struct Catalog {
    items: Vec<String>,
    fail_offset: Option<u32>,
}

impl Catalog {
    /// A catalog of `size` items. Requests starting at `fail_offset` are
    /// rejected.
    pub fn new(size: u32, fail_offset: Option<u32>) -> Self {
        Self {
            items: (1..=size).map(|n| format!("item-{n:03}")).collect(),
            fail_offset,
        }
    }

    pub fn total(&self) -> u32 {
        u32::try_from(self.items.len()).unwrap_or(u32::MAX)
    }

    pub fn page(&self, request: PageRequest) -> Result<Envelope, CatalogError> {
        if self.fail_offset == Some(request.offset) {
            return Err(CatalogError::Unavailable {
                offset: request.offset,
            });
        }
        let total = self.total();
        if request.offset > 0 && request.offset >= total {
            return Err(CatalogError::OutOfRange {
                offset: request.offset,
                total,
            });
        }
        let start = request.offset as usize;
        let end = start.saturating_add(request.limit as usize).min(self.items.len());
        tracing::trace!(message = "catalog.serve", offset = request.offset, served = end - start);
        Ok(Envelope {
            code: 0,
            total,
            data: self.items[start..end].to_vec(),
        })
    }
}
