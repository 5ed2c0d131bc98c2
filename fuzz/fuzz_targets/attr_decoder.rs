#![no_main]

use libfuzzer_sys::fuzz_target;

use dropwatch_dropmon::AttributeDecoder;

/// 중첩 속성을 최대 깊이까지 따라가며 모든 접근자를 호출
fn walk(buf: &[u8], depth: usize) {
    for attr in AttributeDecoder::new(buf) {
        let Ok(attr) = attr else {
            break;
        };
        let _ = attr.u8();
        let _ = attr.u16();
        let _ = attr.u32();
        let _ = attr.u64();
        let _ = attr.string();
        if depth < 4 {
            walk(attr.bytes(), depth + 1);
        }
    }
}

fuzz_target!(|data: &[u8]| {
    walk(data, 0);
});
