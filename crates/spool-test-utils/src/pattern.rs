use bytes::Bytes;

/// Deterministic payload where every byte depends on its offset, so a
/// misplaced write shows up as a content mismatch.
#[must_use]
pub fn pattern_bytes(len: usize) -> Bytes {
    (0..len)
        .map(|i| u8::try_from(i % 251).unwrap_or(0))
        .collect::<Vec<u8>>()
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_is_offset_dependent() {
        let data = pattern_bytes(600);
        assert_eq!(data.len(), 600);
        assert_eq!(data[0], 0);
        assert_eq!(data[250], 250);
        assert_eq!(data[251], 0);
        assert_eq!(data[503], 1);
    }
}
