//! The source node contract.

use podprint_core::{Error, IdentityStructure};

use crate::stream::Stream;

/// Declared tag keys and packet keys. `None` means not known.
pub type Keys = (Option<Vec<String>>, Option<Vec<String>>);

/// A pipeline root that produces rows from outside the pipeline.
pub trait Source: Send + Sync {
    fn label(&self) -> Option<&str> {
        None
    }

    /// Start producing rows.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if any upstream stream is given: sources are graph roots.
    fn forward(&self, upstream: Vec<Stream>) -> Result<Stream, Error>;

    /// Fingerprint input: the node's own parameters followed by `upstream`.
    fn identity_structure(&self, upstream: &[IdentityStructure]) -> IdentityStructure;

    /// Tag and packet keys of the produced rows.
    ///
    /// Without declared keys, `trigger_run` pulls the first row to infer them.
    fn keys(&self, upstream: &[Stream], trigger_run: bool) -> Result<Keys, Error> {
        reject_upstream(upstream.len())?;
        if !trigger_run {
            return Ok((None, None));
        }
        infer_keys(self.forward(Vec::new())?)
    }

    /// `Some(true)` only when tags are provably unique across rows. The default
    /// makes no claim.
    fn claims_unique_tags(&self, upstream: &[Stream]) -> Result<Option<bool>, Error> {
        reject_upstream(upstream.len())?;
        Ok(None)
    }
}

/// Keys of the first row of `stream`, or `(None, None)` if it is empty.
pub fn infer_keys(mut stream: Stream) -> Result<Keys, Error> {
    match stream.next() {
        Some(row) => {
            let (tag, packet) = row?;
            Ok((Some(tag.into_keys().collect()), Some(packet.into_keys().collect())))
        }
        None => Ok((None, None)),
    }
}

pub(crate) fn reject_upstream(count: usize) -> Result<(), Error> {
    if count == 0 {
        return Ok(());
    }
    Err(Error::InvalidArgument(format!(
        "sources do not accept upstream streams (got {count}); they generate their own rows"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use podprint_core::{Packet, Tag};

    struct Fixed;

    impl Source for Fixed {
        fn forward(&self, upstream: Vec<Stream>) -> Result<Stream, Error> {
            reject_upstream(upstream.len())?;
            let tag = Tag::from([("id".to_string(), "1".to_string())]);
            let packet = Packet::from([("data".to_string(), "/tmp/x".to_string())]);
            Ok(Stream::new(std::iter::once(Ok((tag, packet)))))
        }

        fn identity_structure(&self, upstream: &[IdentityStructure]) -> IdentityStructure {
            IdentityStructure::seq(["Fixed"]).extended(upstream.iter().cloned())
        }
    }

    #[test]
    fn test_default_keys_without_run() {
        assert_eq!(Fixed.keys(&[], false).unwrap(), (None, None));
    }

    #[test]
    fn test_default_keys_with_run() {
        let (tags, packets) = Fixed.keys(&[], true).unwrap();
        assert_eq!(tags, Some(vec!["id".to_string()]));
        assert_eq!(packets, Some(vec!["data".to_string()]));
    }

    #[test]
    fn test_default_claims_nothing() {
        assert_eq!(Fixed.claims_unique_tags(&[]).unwrap(), None);
    }

    #[test]
    fn test_upstream_rejected() {
        assert!(matches!(Fixed.forward(vec![Stream::empty()]), Err(Error::InvalidArgument(_))));
        assert!(matches!(Fixed.keys(&[Stream::empty()], false), Err(Error::InvalidArgument(_))));
        assert!(matches!(Fixed.claims_unique_tags(&[Stream::empty()]), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_infer_keys_empty() {
        assert_eq!(infer_keys(Stream::empty()).unwrap(), (None, None));
    }
}
