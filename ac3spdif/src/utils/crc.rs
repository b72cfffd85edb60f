//! CRC-16 used by AC-3 syncframes.
//!
//! Both `crc1` and `crc2` use the generator x^16 + x^15 + x^2 + 1, processed
//! MSB first with a zero initial value. A protected region that includes its
//! CRC word yields a zero remainder.

/// CRC algorithm parameters: polynomial and initial value.
pub struct Algorithm<T> {
    poly: T,
    init: T,
}

/// CRC-16 algorithm protecting AC-3 syncframes.
pub const CRC_AC3_ALG: Algorithm<u16> = Algorithm {
    poly: 0x8005,
    init: 0x0000,
};

#[inline(always)]
const fn crc16_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < table.len() {
        let mut value = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            value = (value << 1) ^ (((value >> 15) & 1) * poly);
            bit += 1;
        }
        table[i] = value;
        i += 1;
    }

    table
}

#[derive(Debug)]
pub struct Crc16 {
    pub poly: u16,
    pub init: u16,
    table: [u16; 256],
}

impl Crc16 {
    pub const fn new(algorithm: &Algorithm<u16>) -> Self {
        Self {
            poly: algorithm.poly,
            init: algorithm.init,
            table: crc16_table(algorithm.poly),
        }
    }

    #[inline(always)]
    pub const fn update(&self, mut crc: u16, bytes: &[u8]) -> u16 {
        let mut i = 0;

        while i < bytes.len() {
            crc = (crc << 8) ^ self.table[(((crc >> 8) as u8) ^ bytes[i]) as usize];
            i += 1;
        }

        crc
    }

    #[inline(always)]
    pub const fn checksum(&self, bytes: &[u8]) -> u16 {
        self.update(self.init, bytes)
    }
}

#[test]
fn crc16_check_value() {
    let crc = Crc16::new(&CRC_AC3_ALG);
    assert_eq!(crc.checksum(b"123456789"), 0xFEE8);
}

#[test]
fn crc16_zero_residue() {
    let crc = Crc16::new(&CRC_AC3_ALG);
    let mut data = b"syncframe payload".to_vec();
    let check = crc.checksum(&data);
    data.extend_from_slice(&check.to_be_bytes());

    assert_eq!(crc.checksum(&data), 0);
}
