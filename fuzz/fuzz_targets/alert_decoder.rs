#![no_main]

use std::time::SystemTime;

use libfuzzer_sys::fuzz_target;

use dropwatch_dropmon::decode_alert;

fuzz_target!(|data: &[u8]| {
    if let Ok(alert) = decode_alert(data, SystemTime::UNIX_EPOCH) {
        let _ = alert.drop_point();
        let _ = alert.since_epoch();
        assert_eq!(alert.packet.captured_len as usize, alert.packet.payload.len());
    }
});
