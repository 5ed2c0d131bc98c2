#![no_main]

use libfuzzer_sys::fuzz_target;

use dropwatch_dropmon::message::{MessageIter, NetlinkMessage};

fuzz_target!(|data: &[u8]| {
    for msg in MessageIter::new(data) {
        match msg {
            Ok(NetlinkMessage::Generic { attrs, .. }) => {
                for attr in dropwatch_dropmon::AttributeDecoder::new(attrs) {
                    if attr.is_err() {
                        break;
                    }
                }
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
});
