use super::*;

#[test]
fn test_i64_roundtrip() {
    let mut buf = vec![];
    store_i64(&mut buf, -12345).unwrap();
    assert_eq!(buf.len(), 8);
    assert_eq!(load_i64(&buf).unwrap(), -12345);
}

#[test]
fn test_u32_roundtrip() {
    let mut buf = vec![];
    store_u32(&mut buf, 0xdead_beef).unwrap();
    assert_eq!(load_u32(&buf).unwrap(), 0xdead_beef);
}

#[test]
fn test_f64_sentinels() {
    let mut buf = vec![];
    store_f64(&mut buf, HIGH_WATER_F64).unwrap();
    assert!(load_f64(&buf).unwrap().is_infinite());

    let mut buf = vec![];
    store_f64(&mut buf, LOW_WATER_F64).unwrap();
    assert!(load_f64(&buf).unwrap().is_sign_negative());
}

#[test]
fn test_big_endian_byte_order() {
    let mut buf = vec![];
    store_i16(&mut buf, 1).unwrap();
    assert_eq!(buf, vec![0x00, 0x01]);
}

#[test]
fn test_store_into_fixed_offset() {
    let mut buf = vec![0u8; 10];
    store_u64_into(&mut buf[2..10], 0x0102_0304_0506_0708).unwrap();
    assert_eq!(load_u64(&buf[2..10]).unwrap(), 0x0102_0304_0506_0708);
    assert_eq!(buf[0..2], [0, 0]);
}
