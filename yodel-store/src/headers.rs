use std::collections::HashMap;

use async_trait::async_trait;
use yodel_common::{Header, HeaderId, PayloadType, traits::HeaderSource};

use crate::{Result, StoreError};

/// Header rows loaded once at startup
#[derive(Debug, Default, Clone)]
pub struct MemoryHeaders {
    headers: HashMap<HeaderId, Header>,
    defaults: HashMap<(PayloadType, bool), HeaderId>,
}

impl MemoryHeaders {
    /// Loads `headers`, refusing more than one default per `(type, group)` key
    pub fn load(headers: impl IntoIterator<Item = Header>) -> Result<Self> {
        let mut loaded = Self::default();

        for header in headers {
            if header.is_default
                && loaded.defaults.insert(header.key(), header.id).is_some()
            {
                return Err(StoreError::DuplicateDefaultHeader(
                    header.payload_type,
                    header.is_group,
                ));
            }

            loaded.headers.insert(header.id, header);
        }

        Ok(loaded)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

#[async_trait]
impl HeaderSource for MemoryHeaders {
    async fn default_header(&self, payload_type: PayloadType, is_group: bool) -> Option<Header> {
        self.defaults
            .get(&(payload_type, is_group))
            .and_then(|id| self.headers.get(id))
            .cloned()
    }

    async fn header(&self, id: HeaderId) -> Option<Header> {
        self.headers.get(&id).cloned()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_are_unique_per_key() {
        let link = Header::new(PayloadType::Link, false, "{sender} sent a link", "", "").as_default();
        let link_group =
            Header::new(PayloadType::Link, true, "{sender} sent a link {social}", "", "").as_default();
        let alternative = Header::new(PayloadType::Link, false, "Look! {sender}", "", "");

        let headers = MemoryHeaders::load([link.clone(), link_group, alternative.clone()])
            .expect("Headers should load");
        assert_eq!(headers.len(), 3);
        assert_eq!(
            headers.default_header(PayloadType::Link, false).await,
            Some(link.clone())
        );
        assert_eq!(headers.header(alternative.id).await, Some(alternative));
        assert_eq!(headers.default_header(PayloadType::Gif, false).await, None);

        let duplicate = Header::new(PayloadType::Link, false, "again", "", "").as_default();
        assert!(matches!(
            MemoryHeaders::load([link, duplicate]),
            Err(StoreError::DuplicateDefaultHeader(PayloadType::Link, false))
        ));
    }
}
