//! Default `MediaDescriber` implementation (§6.5): `Noop`, the
//! zero-configuration default that always returns `None`.

use crate::capability::MediaDescriber;
use anyhow::Result;
use async_trait::async_trait;

pub struct NoopDescriber;

/// Tagged enum over every built-in `MediaDescriber`.
pub enum MediaDescriberImpl {
    Noop(NoopDescriber),
}

#[async_trait]
impl MediaDescriber for MediaDescriberImpl {
    async fn describe(&self, _bytes: &[u8]) -> Result<Option<String>> {
        match self {
            MediaDescriberImpl::Noop(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_describer_always_returns_none() {
        let describer = MediaDescriberImpl::Noop(NoopDescriber);
        assert_eq!(describer.describe(b"bytes").await.unwrap(), None);
    }
}
