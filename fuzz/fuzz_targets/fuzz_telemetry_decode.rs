#![no_main]
use libfuzzer_sys::fuzz_target;
use teleop_core::TelemetryMessage;

fuzz_target!(|data: &[u8]| {
    // Arbitrary datagrams either decode or are rejected, never panic.
    if let Ok(msg) = TelemetryMessage::decode(data) {
        let bytes = msg.encode().expect("encode decoded message");
        let again = TelemetryMessage::decode(&bytes).expect("re-decode");
        assert_eq!(again.terminate, msg.terminate);
    }
});
