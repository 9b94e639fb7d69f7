use crate::framework::MAX_PAYLOAD_BITS;

// little endian
pub fn get_u64(binary: &[u8]) -> u64 {
    let mut res = 0;
    for (i, byte) in binary.iter().enumerate().take(8) {
        res |= (*byte as u64) << (i * 8);
    }
    res
}

pub fn put_u64(binary: &mut [u8], val: u64) {
    for (i, byte) in binary.iter_mut().enumerate().take(8) {
        *byte = (val >> (i * 8)) as u8;
    }
}

/// Serialize the low `len` bytes of a port value.
pub fn payload_bytes(val: u64, len: usize) -> Vec<u8> {
    let mut bytes = vec![0; len];
    put_u64(&mut bytes, val);
    bytes
}

/// Mask selecting the low `bits` bits of a port value.
pub fn width_mask(bits: u32) -> u64 {
    if bits >= MAX_PAYLOAD_BITS {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_payload() {
        assert_eq!(get_u64(&[0x34, 0x12]), 0x1234);
        assert_eq!(payload_bytes(0xabcd_1234, 2), vec![0x34, 0x12]);
        assert_eq!(width_mask(16), 0xffff);
        assert_eq!(width_mask(64), u64::MAX);
    }
}
