//! RFC 4880 §3.2 multiprecision integer encoding.

/// Strips leading zero bytes (keeping one if the value is all-zero)
/// and prefixes the result with its big-endian bit length.
pub fn mpi_encode(value: &[u8]) -> Vec<u8> {
    let stripped_from = value.iter().position(|&b| b != 0).unwrap_or(value.len().saturating_sub(1));
    let body = if value.is_empty() {
        &[0u8][..]
    } else {
        &value[stripped_from..]
    };

    let bit_len = if body.is_empty() || (body.len() == 1 && body[0] == 0) {
        0u16
    } else {
        ((body.len() - 1) * 8) as u16 + (8 - body[0].leading_zeros() as u16)
    };

    let mut out = Vec::with_capacity(2 + body.len());
    out.extend_from_slice(&bit_len.to_be_bytes());
    out.extend_from_slice(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_zeros() {
        let out = mpi_encode(&[0x00, 0x00, 0x01, 0x23]);
        assert_eq!(out, vec![0x00, 0x09, 0x01, 0x23]);
    }

    #[test]
    fn all_zero_input_keeps_one_byte() {
        let out = mpi_encode(&[0x00, 0x00, 0x00]);
        assert_eq!(out, vec![0x00, 0x00, 0x00]);
    }

    #[test]
    fn bit_length_counts_leading_bit_of_msb() {
        // 0x80 has its high bit set: bit length 8, not 7 or 9.
        let out = mpi_encode(&[0x80]);
        assert_eq!(out, vec![0x00, 0x08, 0x80]);
        // 0x01 is bit length 1.
        let out = mpi_encode(&[0x01]);
        assert_eq!(out, vec![0x00, 0x01, 0x01]);
    }
}
