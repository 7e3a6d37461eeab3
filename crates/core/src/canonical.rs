//! Type-tagged, length-prefixed byte encoding shared by the object and table hashers.
//!
//! Every value starts with a one-byte type tag, so `1`, `1.0` and `"1"` never
//! produce the same bytes. Variable-length payloads carry a big-endian `u64`
//! length prefix, which keeps concatenations unambiguous.

use crate::digest::{Digest, DigestWriter};

pub(crate) const TAG_NULL: u8 = 0x00;
pub(crate) const TAG_BOOL: u8 = 0x01;
pub(crate) const TAG_INT: u8 = 0x02;
pub(crate) const TAG_UINT: u8 = 0x03;
pub(crate) const TAG_FLOAT: u8 = 0x04;
pub(crate) const TAG_STR: u8 = 0x05;
pub(crate) const TAG_BYTES: u8 = 0x06;
pub(crate) const TAG_DIGEST: u8 = 0x07;
pub(crate) const TAG_SEQ: u8 = 0x08;
pub(crate) const TAG_MAP: u8 = 0x09;
pub(crate) const TAG_FUNCTION: u8 = 0x0a;
pub(crate) const TAG_MISSING: u8 = 0x0b;

/// Anything the encoder can write bytes into.
pub(crate) trait Sink {
    fn put(&mut self, bytes: &[u8]);
}

impl Sink for Vec<u8> {
    fn put(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

impl Sink for DigestWriter {
    fn put(&mut self, bytes: &[u8]) {
        self.update(bytes);
    }
}

pub(crate) fn write_tag(sink: &mut impl Sink, tag: u8) {
    sink.put(&[tag]);
}

pub(crate) fn write_len(sink: &mut impl Sink, len: usize) {
    sink.put(&(len as u64).to_be_bytes());
}

pub(crate) fn write_bool(sink: &mut impl Sink, value: bool) {
    sink.put(&[TAG_BOOL, u8::from(value)]);
}

pub(crate) fn write_int(sink: &mut impl Sink, value: i64) {
    write_tag(sink, TAG_INT);
    sink.put(&value.to_be_bytes());
}

pub(crate) fn write_uint(sink: &mut impl Sink, value: u64) {
    write_tag(sink, TAG_UINT);
    sink.put(&value.to_be_bytes());
}

/// Floats encode their IEEE-754 bits with `-0.0` folded into `0.0` and every NaN
/// folded into the canonical quiet NaN.
pub(crate) fn write_float(sink: &mut impl Sink, value: f64) {
    let bits = if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    };
    write_tag(sink, TAG_FLOAT);
    sink.put(&bits.to_be_bytes());
}

pub(crate) fn write_str(sink: &mut impl Sink, value: &str) {
    write_tag(sink, TAG_STR);
    write_len(sink, value.len());
    sink.put(value.as_bytes());
}

pub(crate) fn write_bytes(sink: &mut impl Sink, value: &[u8]) {
    write_tag(sink, TAG_BYTES);
    write_len(sink, value.len());
    sink.put(value);
}

pub(crate) fn write_digest(sink: &mut impl Sink, value: &Digest) {
    write_tag(sink, TAG_DIGEST);
    sink.put(value.as_bytes());
}

/// Hash a flat list of strings under the canonical encoding.
pub(crate) fn digest_strs(parts: &[&str]) -> Digest {
    let mut writer = DigestWriter::new();
    write_tag(&mut writer, TAG_SEQ);
    write_len(&mut writer, parts.len());
    for part in parts {
        write_str(&mut writer, part);
    }
    writer.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(f: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
        let mut buf = Vec::new();
        f(&mut buf);
        buf
    }

    #[test]
    fn test_type_tags_separate_lookalikes() {
        let int = encoded(|b| write_int(b, 1));
        let float = encoded(|b| write_float(b, 1.0));
        let string = encoded(|b| write_str(b, "1"));
        assert_ne!(int, float);
        assert_ne!(int, string);
        assert_ne!(float, string);
    }

    #[test]
    fn test_float_canonicalization() {
        assert_eq!(encoded(|b| write_float(b, -0.0)), encoded(|b| write_float(b, 0.0)));
        assert_eq!(encoded(|b| write_float(b, f64::NAN)), encoded(|b| write_float(b, -f64::NAN)));
    }

    #[test]
    fn test_length_prefix_disambiguates() {
        assert_ne!(digest_strs(&["ab", "c"]), digest_strs(&["a", "bc"]));
    }
}
