//! Advertising data parsing
//!
//! Advertising data is a run of AD structures, each a length byte followed
//! by an AD type byte and `length - 1` bytes of payload.

/// Iterator over the AD structures of an advertising data buffer
///
/// Yields `(ad_type, payload)` pairs. Iteration stops at a zero length
/// (early terminator) or at a structure that claims more bytes than remain.
#[derive(Debug, Clone)]
pub struct AdStructures<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (&length, rest) = self.data.split_first()?;
        let length = length as usize;

        if length == 0 || length > rest.len() {
            self.data = &[];
            return None;
        }

        let (structure, tail) = rest.split_at(length);
        self.data = tail;

        Some((structure[0], &structure[1..]))
    }
}

/// Walk the AD structures in `data`
pub fn ad_structures(data: &[u8]) -> AdStructures<'_> {
    AdStructures { data }
}
