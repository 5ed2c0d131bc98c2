#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use dropwatch_dissector::PacketDissector;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// VLAN 태그 허용 개수 (0..=7)
    max_vlan_tags: u8,
    frame: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let dissector = PacketDissector::new().with_max_vlan_tags(usize::from(input.max_vlan_tags % 8));
    let result = dissector.dissect(&input.frame);

    // 어떤 입력이든 요약 출력은 패닉하지 않음
    let _ = result.summary.to_string();
    if let Some(err) = result.error {
        let _ = err.layer();
    }
});
