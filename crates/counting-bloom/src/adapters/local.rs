//! Local adapter: the in-process engine behind the membership port.

use async_trait::async_trait;

use crate::domain::CountingBloomFilter;
use crate::error::FilterError;
use crate::ports::MembershipFilter;

#[async_trait]
impl MembershipFilter for CountingBloomFilter {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn insert(&mut self, key: &[u8]) -> Result<(), FilterError> {
        CountingBloomFilter::insert(self, key)
    }

    async fn delete(&mut self, key: &[u8]) -> Result<(), FilterError> {
        CountingBloomFilter::delete(self, key);
        Ok(())
    }

    async fn contains_all(&self, keys: &[&[u8]]) -> Result<bool, FilterError> {
        Ok(CountingBloomFilter::contains_all(self, keys.iter().copied()))
    }

    async fn contains(&self, key: &[u8]) -> Result<bool, FilterError> {
        Ok(CountingBloomFilter::contains(self, key))
    }

    async fn clear(&mut self) -> Result<(), FilterError> {
        CountingBloomFilter::clear(self);
        Ok(())
    }

    async fn num_set(&self) -> Result<u64, FilterError> {
        Ok(self.size_estimate() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FilterConfigBuilder;

    fn filter() -> CountingBloomFilter {
        let config = FilterConfigBuilder::new()
            .size(100)
            .hash_count(2)
            .seed(1)
            .bucket_width(2)
            .build()
            .unwrap();
        CountingBloomFilter::new(config).unwrap()
    }

    async fn exercise(bf: &mut dyn MembershipFilter) {
        bf.insert(b"test").await.unwrap();
        bf.insert(b"test1").await.unwrap();

        assert!(bf.contains(b"test").await.unwrap());
        assert!(bf.contains_all(&[&b"test"[..], &b"test1"[..]]).await.unwrap());
        assert!(!bf.contains_all(&[&b"test"[..], &b"test2"[..]]).await.unwrap());
        assert_eq!(bf.num_set().await.unwrap(), 4);

        bf.delete(b"test").await.unwrap();
        assert!(!bf.contains(b"test").await.unwrap());

        bf.clear().await.unwrap();
        assert_eq!(bf.num_set().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_engine_through_port() {
        let mut bf = filter();
        assert_eq!(MembershipFilter::backend_name(&bf), "local");
        exercise(&mut bf).await;
    }

    #[tokio::test]
    async fn test_port_and_engine_agree() {
        let mut bf = filter();
        MembershipFilter::insert(&mut bf, b"abcd").await.unwrap();

        assert!(CountingBloomFilter::contains(&bf, "abcd"));
        assert_eq!(bf.bucket_values()[91], 1);
        assert_eq!(bf.bucket_values()[97], 1);
    }
}
