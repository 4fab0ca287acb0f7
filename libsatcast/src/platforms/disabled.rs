//! Stand-in for a platform that is switched off in configuration
//!
//! Accepts every post without network I/O and answers with a
//! `disabled_<unix ms>` id, so tasks still report both platforms.

use async_trait::async_trait;

use crate::error::PlatformResult;
use crate::platforms::{MediaRef, Platform};
use crate::types::PostReceipt;

pub struct DisabledPlatform {
    name: String,
}

impl DisabledPlatform {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Platform for DisabledPlatform {
    fn name(&self) -> &str {
        &self.name
    }

    async fn post(&self, _text: &str, _media: &[MediaRef]) -> PlatformResult<PostReceipt> {
        let id = format!("disabled_{}", chrono::Utc::now().timestamp_millis());
        Ok(PostReceipt::new(id))
    }
}
