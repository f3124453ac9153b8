//! Checksums used by the frame codecs

/// CRC-16-CCITT (poly 0x1021, init 0xFFFF)
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u32 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u32) << 8;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x10000 != 0 {
                crc ^= 0x1021;
            }
        }
    }
    (crc & 0xFFFF) as u16
}

/// Write the CRC-16 of `buf[..len - 2]` big-endian into the last two bytes
pub fn add_crc16(buf: &mut [u8]) {
    let n = buf.len() - 2;
    let crc = crc16(&buf[..n]);
    buf[n] = (crc >> 8) as u8;
    buf[n + 1] = crc as u8;
}

/// Verify a buffer produced by `add_crc16`
pub fn check_crc16(buf: &[u8]) -> bool {
    if buf.len() < 2 {
        return false;
    }
    let n = buf.len() - 2;
    let received = ((buf[n] as u16) << 8) | buf[n + 1] as u16;
    received == crc16(&buf[..n])
}

/// DMR embedded LC checksum: sum of the nine LC bytes modulo 31
pub fn five_bit_checksum(lc: &[u8; 9]) -> u8 {
    let total: u32 = lc.iter().map(|&b| b as u32).sum();
    (total % 31) as u8
}

/// Wires-X command checksum: byte sum modulo 256
pub fn byte_sum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}
